use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriveError>;

/// Errors from the Google Drive API.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Credentials were rejected (401/403). Not retryable.
    #[error("Drive authentication failed: {0}")]
    Auth(String),

    /// Too many requests (429). Retryable; `retry_after` comes from the
    /// Retry-After response header when present.
    #[error("Drive rate limit exceeded")]
    RateLimited { retry_after: Option<f64> },

    /// The requested file does not exist (404).
    #[error("Drive file not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the API.
    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("Drive request failed: {0}")]
    Http(#[from] reqwest::Error),
}

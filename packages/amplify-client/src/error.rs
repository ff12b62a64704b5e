use thiserror::Error;

pub type Result<T> = std::result::Result<T, AmplifyError>;

/// Errors from the Amplify backend (AppSync GraphQL or the storage gateway).
#[derive(Debug, Error)]
pub enum AmplifyError {
    /// The id token was rejected. Not retryable; the caller must
    /// re-authenticate.
    #[error("Amplify authentication failed: {0}")]
    Auth(String),

    /// Too many requests. Retryable.
    #[error("Amplify rate limit exceeded")]
    RateLimited { retry_after: Option<f64> },

    /// A storage gateway upload failed.
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    /// A GraphQL operation returned errors or a malformed response.
    #[error("GraphQL operation {operation} failed: {message}")]
    Query { operation: String, message: String },

    /// Transport-level failure.
    #[error("Amplify request failed: {0}")]
    Http(#[from] reqwest::Error),
}

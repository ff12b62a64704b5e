//! Error taxonomy for the migrator.
//!
//! The split that matters at runtime: authentication failures are fatal to
//! the whole run and must propagate out of file processing untouched, while
//! everything else is either retried or recorded against the one file it
//! affected. `is_auth` is checked at every engine stage to enforce that.

use thiserror::Error;

use amplify_client::AmplifyError;
use drive_client::DriveError;

pub type Result<T> = std::result::Result<T, MigratorError>;

#[derive(Debug, Error)]
pub enum MigratorError {
    /// Invalid or missing settings. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credential or token failure against any collaborator. Fatal to the
    /// current run; the batch is left resumable.
    #[error("Authentication failed ({provider}): {message}")]
    Authentication { provider: String, message: String },

    /// A collaborator asked us to slow down. Retryable.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<f64>,
    },

    /// Source download failure. Retryable per the engine's policy.
    #[error("{0}")]
    Download(String),

    /// Storage upload failure. Terminal for the affected file.
    #[error("{0}")]
    Upload(String),

    /// GraphQL query or mutation failure.
    #[error("GraphQL operation {operation} failed: {message}")]
    GraphQL { operation: String, message: String },

    /// Progress state misuse (saving with no folder loaded, resuming a
    /// folder with no snapshot).
    #[error("{0}")]
    Progress(String),

    /// A file extension outside the supported media set.
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MigratorError {
    /// Fatal, run-wide condition: never caught inside file processing.
    pub fn is_auth(&self) -> bool {
        matches!(self, MigratorError::Authentication { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MigratorError::RateLimited { .. })
    }

    /// Server-provided retry hint in seconds, when one exists.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            MigratorError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<DriveError> for MigratorError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Auth(message) => MigratorError::Authentication {
                provider: "google_drive".to_string(),
                message,
            },
            DriveError::RateLimited { retry_after } => MigratorError::RateLimited {
                message: "Drive rate limit exceeded".to_string(),
                retry_after,
            },
            other => MigratorError::Download(other.to_string()),
        }
    }
}

impl From<AmplifyError> for MigratorError {
    fn from(err: AmplifyError) -> Self {
        match err {
            AmplifyError::Auth(message) => MigratorError::Authentication {
                provider: "cognito".to_string(),
                message,
            },
            AmplifyError::RateLimited { retry_after } => MigratorError::RateLimited {
                message: "Amplify rate limit exceeded".to_string(),
                retry_after,
            },
            AmplifyError::Upload { .. } => MigratorError::Upload(err.to_string()),
            AmplifyError::Query { operation, message } => {
                MigratorError::GraphQL { operation, message }
            }
            AmplifyError::Http(e) => MigratorError::GraphQL {
                operation: "request".to_string(),
                message: e.to_string(),
            },
        }
    }
}

//! Environment-driven configuration.
//!
//! Token acquisition (Google OAuth, Cognito) happens outside this tool; the
//! already-exchanged tokens arrive through the environment along with the
//! endpoint settings.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::{MigratorError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the Drive API.
    pub google_access_token: String,
    /// Cognito id token, sent to both AppSync and the storage gateway.
    pub cognito_id_token: String,
    /// AppSync GraphQL endpoint.
    pub api_endpoint: String,
    pub storage_bucket: String,
    pub aws_region: String,
    /// Max in-flight file pipelines.
    pub concurrency: usize,
    /// Total download attempts per file.
    pub retry_attempts: u32,
    /// Base backoff delay, doubled on each retry.
    pub retry_delay: Duration,
    /// Default for the media `isAvailableForPublicUse` flag.
    pub default_media_public: bool,
    /// Where progress snapshots live.
    pub progress_dir: PathBuf,
    /// Token bucket guarding GraphQL calls.
    pub api_requests_per_second: f64,
    pub api_burst_size: usize,
}

impl Config {
    /// Load configuration from environment variables (and `.env` when
    /// present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            google_access_token: required("GOOGLE_ACCESS_TOKEN")?,
            cognito_id_token: required("COGNITO_ID_TOKEN")?,
            api_endpoint: required("AMPLIFY_API_ENDPOINT")?,
            storage_bucket: required("AMPLIFY_STORAGE_BUCKET")?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            concurrency: parsed("MIGRATION_CONCURRENCY", 10)?,
            retry_attempts: parsed("MIGRATION_RETRY_ATTEMPTS", 3)?,
            retry_delay: Duration::from_secs(parsed("MIGRATION_RETRY_DELAY_SECONDS", 5u64)?),
            default_media_public: parsed("MIGRATION_DEFAULT_MEDIA_PUBLIC", false)?,
            progress_dir: env::var("MIGRATION_PROGRESS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".migration-progress")),
            api_requests_per_second: parsed("API_REQUESTS_PER_SECOND", 10.0)?,
            api_burst_size: parsed("API_BURST_SIZE", 10)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| MigratorError::Configuration(format!("{key} must be set")))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| MigratorError::Configuration(format!("{key} has invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

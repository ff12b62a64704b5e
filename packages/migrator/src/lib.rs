//! Migrates observation media out of Google Drive into object storage and
//! links each uploaded file to its observation records over GraphQL.
//!
//! Source files are named by the sequential observation ids they belong to
//! (`6602.jpg`, `6602a.jpg`, `6000-6001.jpg`). A run lists a Drive folder,
//! classifies every filename, downloads and re-uploads each valid file, and
//! creates one media record per matched observation. Per-folder progress is
//! persisted so interrupted runs resume where they left off, and the whole
//! pipeline is idempotent when pointed at the same folder twice.

pub mod config;
pub mod error;
pub mod media;
pub mod migration;
pub mod rate_limit;
pub mod sources;
pub mod targets;

pub use config::Config;
pub use error::{MigratorError, Result};

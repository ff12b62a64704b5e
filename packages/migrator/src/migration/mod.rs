pub mod engine;
pub mod mapper;
pub mod progress;

pub use engine::{EngineOptions, MigrationEngine, MigrationSummary, ScanReport, SAVE_INTERVAL};
pub use mapper::{FilenamePattern, ParsedFilename};
pub use progress::{FileProgress, FileStatus, ProgressSummary, ProgressTracker, UpdateFields};

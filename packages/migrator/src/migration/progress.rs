//! Durable, per-folder migration progress.
//!
//! One JSON snapshot per folder, rewritten wholesale on every save so a
//! crashed run can always be reconstructed from the last flush. Snapshot
//! persistence is deliberately not append-only: resume works by re-deriving
//! the pending/failed/partial sets from the full snapshot, so there is
//! nothing to replay.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};

/// Lifecycle state of one source file. See the engine docs for the
/// transition diagram; Completed, Failed, Orphan, NeedsReview, and Partial
/// are terminal within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Downloaded,
    Uploaded,
    Completed,
    Failed,
    Orphan,
    NeedsReview,
    Partial,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Downloaded => "downloaded",
            FileStatus::Uploaded => "uploaded",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
            FileStatus::Orphan => "orphan",
            FileStatus::NeedsReview => "needs_review",
            FileStatus::Partial => "partial",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migration state for one source file. Owned by the tracker; mutated only
/// through [`ProgressTracker::update_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProgress {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default)]
    pub sequential_ids: Vec<u64>,
    #[serde(default)]
    pub observation_ids: Vec<String>,
    pub s3_url: Option<String>,
    #[serde(default)]
    pub media_ids: Vec<String>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub pending: usize,
    pub downloaded: usize,
    pub uploaded: usize,
    pub completed: usize,
    pub failed: usize,
    pub orphan: usize,
    pub needs_review: usize,
    pub partial: usize,
}

/// Optional fields for [`ProgressTracker::update_file`]. Fields left `None`
/// are preserved on an existing record, except `error`, which is always
/// written through, so a successful transition clears any prior error.
#[derive(Debug, Default, Clone)]
pub struct UpdateFields {
    pub sequential_ids: Option<Vec<u64>>,
    pub observation_ids: Option<Vec<String>>,
    pub s3_url: Option<String>,
    pub media_ids: Option<Vec<String>>,
    pub error: Option<String>,
}

/// On-disk snapshot shape. The summary block duplicates what the files map
/// already says so operators can inspect a snapshot without re-aggregating.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    folder_id: String,
    started_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    total_files: usize,
    files: HashMap<String, FileProgress>,
    summary: ProgressSummary,
}

pub struct ProgressTracker {
    progress_dir: PathBuf,
    folder_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    total_files: usize,
    files: HashMap<String, FileProgress>,
}

impl ProgressTracker {
    pub fn new(progress_dir: impl Into<PathBuf>) -> Self {
        Self {
            progress_dir: progress_dir.into(),
            folder_id: None,
            started_at: None,
            updated_at: None,
            total_files: 0,
            files: HashMap::new(),
        }
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn files(&self) -> &HashMap<String, FileProgress> {
        &self.files
    }

    /// Snapshot location for the currently-loaded folder.
    pub fn progress_path(&self) -> Option<PathBuf> {
        self.folder_id
            .as_ref()
            .map(|id| self.progress_dir.join(format!("progress_{id}.json")))
    }

    /// Load the snapshot for a folder, or start fresh if none exists.
    /// Returns whether a prior snapshot was found. A corrupt snapshot is
    /// logged and treated as missing, never surfaced as an error.
    pub fn load(&mut self, folder_id: &str) -> Result<bool> {
        self.folder_id = Some(folder_id.to_string());
        self.started_at = Some(Utc::now());
        self.updated_at = None;
        self.total_files = 0;
        self.files = HashMap::new();

        let path = self
            .progress_path()
            .ok_or_else(|| MigratorError::Progress("load failed: no folder_id".to_string()))?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => {
                self.started_at = snapshot.started_at.or(self.started_at);
                self.updated_at = snapshot.updated_at;
                self.total_files = snapshot.total_files;
                self.files = snapshot.files;
                tracing::info!(
                    folder_id,
                    files = self.files.len(),
                    "Loaded progress snapshot"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    folder_id,
                    path = %path.display(),
                    error = %e,
                    "Progress snapshot is corrupt, starting fresh"
                );
                Ok(false)
            }
        }
    }

    /// Write the full current state as one snapshot. Fails if no folder has
    /// been loaded, since there is no target location.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .progress_path()
            .ok_or_else(|| MigratorError::Progress("save called with no folder_id loaded".to_string()))?;
        self.updated_at = Some(Utc::now());

        let snapshot = Snapshot {
            folder_id: self.folder_id.clone().unwrap_or_default(),
            started_at: self.started_at,
            updated_at: self.updated_at,
            total_files: self.total_files,
            files: self.files.clone(),
            summary: self.get_summary(),
        };

        fs::create_dir_all(&self.progress_dir)?;
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        tracing::debug!(path = %path.display(), files = self.files.len(), "Saved progress");
        Ok(())
    }

    /// Declared total for reporting only; does not affect any invariant.
    pub fn set_total_files(&mut self, total: usize) {
        self.total_files = total;
    }

    /// Upsert one file's progress. `status` always overwrites; optional
    /// fields merge per [`UpdateFields`]; `updated_at` is refreshed.
    pub fn update_file(
        &mut self,
        file_id: &str,
        filename: &str,
        status: FileStatus,
        fields: UpdateFields,
    ) {
        let now = Some(Utc::now());
        match self.files.get_mut(file_id) {
            Some(existing) => {
                existing.filename = filename.to_string();
                existing.status = status;
                if let Some(ids) = fields.sequential_ids {
                    existing.sequential_ids = ids;
                }
                if let Some(ids) = fields.observation_ids {
                    existing.observation_ids = ids;
                }
                if let Some(url) = fields.s3_url {
                    existing.s3_url = Some(url);
                }
                if let Some(ids) = fields.media_ids {
                    existing.media_ids = ids;
                }
                existing.error = fields.error;
                existing.updated_at = now;
            }
            None => {
                self.files.insert(
                    file_id.to_string(),
                    FileProgress {
                        filename: filename.to_string(),
                        status,
                        sequential_ids: fields.sequential_ids.unwrap_or_default(),
                        observation_ids: fields.observation_ids.unwrap_or_default(),
                        s3_url: fields.s3_url,
                        media_ids: fields.media_ids.unwrap_or_default(),
                        error: fields.error,
                        updated_at: now,
                    },
                );
            }
        }
    }

    pub fn get_file(&self, file_id: &str) -> Option<&FileProgress> {
        self.files.get(file_id)
    }

    pub fn get_files_by_status(&self, status: FileStatus) -> Vec<&FileProgress> {
        self.files.values().filter(|f| f.status == status).collect()
    }

    pub fn get_pending_file_ids(&self) -> Vec<String> {
        self.ids_with_status(FileStatus::Pending)
    }

    pub fn get_failed_file_ids(&self) -> Vec<String> {
        self.ids_with_status(FileStatus::Failed)
    }

    pub fn get_partial_file_ids(&self) -> Vec<String> {
        self.ids_with_status(FileStatus::Partial)
    }

    fn ids_with_status(&self, status: FileStatus) -> Vec<String> {
        self.files
            .iter()
            .filter(|(_, f)| f.status == status)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn get_summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary::default();
        for file in self.files.values() {
            match file.status {
                FileStatus::Pending => summary.pending += 1,
                FileStatus::Downloaded => summary.downloaded += 1,
                FileStatus::Uploaded => summary.uploaded += 1,
                FileStatus::Completed => summary.completed += 1,
                FileStatus::Failed => summary.failed += 1,
                FileStatus::Orphan => summary.orphan += 1,
                FileStatus::NeedsReview => summary.needs_review += 1,
                FileStatus::Partial => summary.partial += 1,
            }
        }
        summary
    }

    /// Export every record with the given status as a `file_id -> record`
    /// map. Returns how many were written; zero is not an error.
    pub fn export_to_json(&self, status: FileStatus, output_path: &Path) -> Result<usize> {
        let matching: HashMap<&String, &FileProgress> = self
            .files
            .iter()
            .filter(|(_, f)| f.status == status)
            .collect();
        let count = matching.len();
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, serde_json::to_string_pretty(&matching)?)?;
        tracing::info!(status = %status, count, path = %output_path.display(), "Exported records");
        Ok(count)
    }
}

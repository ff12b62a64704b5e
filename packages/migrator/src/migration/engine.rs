//! Migration engine: drives the download → upload → link pipeline.
//!
//! Per-file state machine (terminal states marked *):
//!
//! ```text
//! PENDING -> DOWNLOADED -> UPLOADED -> COMPLETED*
//! PENDING -> NEEDS_REVIEW*        (invalid filename)
//! PENDING -> ORPHAN*              (no observation matches any sequential id)
//! PENDING|DOWNLOADED|UPLOADED -> FAILED*   (errors exhaust retries, or no media created)
//! PENDING|DOWNLOADED|UPLOADED -> PARTIAL*  (some but not all media created)
//! FAILED|PARTIAL -> PENDING       (on resume)
//! ```
//!
//! Per-file errors stop at the pipeline boundary and land in that file's
//! progress record. Authentication errors are the one exception: a stale
//! token affects every remaining file identically, so they propagate out and
//! tear down the run, leaving the batch resumable from the last flush.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{MigratorError, Result};
use crate::media;
use crate::migration::mapper::{self, FilenamePattern};
use crate::migration::progress::{FileStatus, ProgressSummary, ProgressTracker, UpdateFields};
use crate::rate_limit::RateLimiter;
use crate::sources::{DriveFile, FileSource};
use crate::targets::{ObjectStorage, ObservationApi};

/// Flush the progress snapshot to disk after this many completed files.
/// Bounds data loss on crash without paying a write per file.
pub const SAVE_INTERVAL: usize = 50;

pub type ProgressCallback = dyn Fn(&str, FileStatus) + Send + Sync;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Max in-flight file pipelines.
    pub concurrency: usize,
    /// Total download attempts per file.
    pub retry_attempts: u32,
    /// Base backoff delay, doubled on each retry.
    pub retry_delay: Duration,
    /// Default for new media records' public flag.
    pub default_media_public: bool,
    /// Token bucket settings guarding observation API calls.
    pub requests_per_second: f64,
    pub burst_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            default_media_public: false,
            requests_per_second: 10.0,
            burst_size: 10,
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            default_media_public: config.default_media_public,
            requests_per_second: config.api_requests_per_second,
            burst_size: config.api_burst_size,
        }
    }
}

/// Per-pattern counts from a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub single: usize,
    pub multiple: usize,
    pub range: usize,
    pub invalid: usize,
}

impl ScanReport {
    fn record(&mut self, pattern: FilenamePattern) {
        match pattern {
            FilenamePattern::Single => self.single += 1,
            FilenamePattern::Multiple => self.multiple += 1,
            FilenamePattern::Range => self.range += 1,
            FilenamePattern::Invalid => self.invalid += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.single + self.multiple + self.range + self.invalid
    }
}

/// Per-status counts plus the declared total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub total: usize,
    #[serde(flatten)]
    pub counts: ProgressSummary,
}

pub struct MigrationEngine {
    source: Arc<dyn FileSource>,
    storage: Arc<dyn ObjectStorage>,
    api: Arc<dyn ObservationApi>,
    tracker: Arc<Mutex<ProgressTracker>>,
    limiter: RateLimiter,
    options: EngineOptions,
    callback: Option<Box<ProgressCallback>>,
    processed_since_save: Mutex<usize>,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn FileSource>,
        storage: Arc<dyn ObjectStorage>,
        api: Arc<dyn ObservationApi>,
        tracker: Arc<Mutex<ProgressTracker>>,
        options: EngineOptions,
    ) -> Self {
        let limiter = RateLimiter::new(options.requests_per_second, options.burst_size);
        Self {
            source,
            storage,
            api,
            tracker,
            limiter,
            options,
            callback: None,
            processed_since_save: Mutex::new(0),
        }
    }

    /// Install a per-file reporting callback, invoked once per file with its
    /// terminal status. Reporting only; never relied on for correctness.
    pub fn set_progress_callback(
        &mut self,
        callback: impl Fn(&str, FileStatus) + Send + Sync + 'static,
    ) {
        self.callback = Some(Box::new(callback));
    }

    /// List and classify every file in a folder, registering untracked ones.
    /// No downloads or uploads happen; existing progress is never
    /// overwritten. Returns per-pattern counts.
    pub async fn scan(&self, folder_id: &str) -> Result<ScanReport> {
        let files = self.source.list_files(folder_id).await?;
        let mut tracker = self.tracker.lock().await;
        tracker.load(folder_id)?;
        tracker.set_total_files(files.len());

        let mut report = ScanReport::default();
        for file in &files {
            let parsed = mapper::parse(&file.name);
            report.record(parsed.pattern);
            if tracker.get_file(&file.id).is_none() {
                register_file(&mut tracker, file);
            }
        }
        tracker.save()?;

        info!(
            folder_id,
            single = report.single,
            multiple = report.multiple,
            range = report.range,
            invalid = report.invalid,
            "Scan complete"
        );
        Ok(report)
    }

    /// Full migration run: register newly-seen files, then process
    /// everything pending. Progress is flushed periodically and
    /// unconditionally at the end, even when individual files failed.
    pub async fn migrate(
        self: &Arc<Self>,
        folder_id: &str,
        dry_run: bool,
        skip_existing: bool,
    ) -> Result<()> {
        let files = self.source.list_files(folder_id).await?;

        let pending: Vec<DriveFile> = {
            let mut tracker = self.tracker.lock().await;
            tracker.load(folder_id)?;
            tracker.set_total_files(files.len());
            for file in &files {
                if tracker.get_file(&file.id).is_none() {
                    register_file(&mut tracker, file);
                }
            }
            tracker.save()?;

            let pending_ids: HashSet<String> = tracker.get_pending_file_ids().into_iter().collect();
            files
                .into_iter()
                .filter(|f| pending_ids.contains(&f.id))
                .collect()
        };

        let run = self.process_batch(pending, dry_run, skip_existing).await;
        let save = self.tracker.lock().await.save();
        run.and(save)
    }

    /// Retry everything pending, failed, or partial from a prior run.
    /// Fails if the folder has no progress snapshot, since there is nothing
    /// to resume. Metadata is re-fetched per file since the snapshot may be
    /// long out of date; files whose metadata fetch fails are marked failed
    /// and not retried this run.
    pub async fn resume(
        self: &Arc<Self>,
        folder_id: &str,
        dry_run: bool,
        skip_existing: bool,
    ) -> Result<()> {
        let candidates: Vec<(String, String, FileStatus)> = {
            let mut tracker = self.tracker.lock().await;
            let found = tracker.load(folder_id)?;
            if !found {
                return Err(MigratorError::Progress(format!(
                    "No progress file found for folder {folder_id}"
                )));
            }
            let mut ids = tracker.get_pending_file_ids();
            ids.extend(tracker.get_failed_file_ids());
            ids.extend(tracker.get_partial_file_ids());
            ids.into_iter()
                .filter_map(|id| {
                    tracker
                        .get_file(&id)
                        .map(|f| (id.clone(), f.filename.clone(), f.status))
                })
                .collect()
        };

        if candidates.is_empty() {
            info!(folder_id, "Nothing to resume");
            return Ok(());
        }
        info!(folder_id, count = candidates.len(), "Resuming migration");

        let mut to_process = Vec::new();
        for (file_id, filename, status) in candidates {
            match self.source.get_file_metadata(&file_id).await {
                Ok(file) => {
                    if matches!(status, FileStatus::Failed | FileStatus::Partial) {
                        self.tracker.lock().await.update_file(
                            &file_id,
                            &file.name,
                            FileStatus::Pending,
                            UpdateFields::default(),
                        );
                    }
                    to_process.push(file);
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!(file_id, error = %e, "Metadata fetch failed during resume");
                    self.tracker.lock().await.update_file(
                        &file_id,
                        &filename,
                        FileStatus::Failed,
                        UpdateFields {
                            error: Some(format!("Could not fetch file metadata: {e}")),
                            ..Default::default()
                        },
                    );
                }
            }
        }
        self.tracker.lock().await.save()?;

        let run = self.process_batch(to_process, dry_run, skip_existing).await;
        let save = self.tracker.lock().await.save();
        run.and(save)
    }

    /// Process a batch of files under the concurrency gate. The first fatal
    /// error aborts the remaining tasks.
    async fn process_batch(
        self: &Arc<Self>,
        files: Vec<DriveFile>,
        dry_run: bool,
        skip_existing: bool,
    ) -> Result<()> {
        if files.is_empty() {
            info!("No files to process");
            return Ok(());
        }
        info!(
            count = files.len(),
            concurrency = self.options.concurrency,
            dry_run,
            skip_existing,
            "Processing files"
        );
        *self.processed_since_save.lock().await = 0;

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut tasks = tokio::task::JoinSet::new();
        for file in files {
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| MigratorError::Progress("concurrency gate closed".to_string()))?;
                engine.process_file(&file, dry_run, skip_existing).await?;
                engine.checkpoint().await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(MigratorError::Progress(format!("worker task failed: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Single-file pipeline: parse, resolve observations, download, upload,
    /// link, record. Every outcome except an auth failure is absorbed into
    /// the file's progress record.
    pub async fn process_file(
        &self,
        file: &DriveFile,
        dry_run: bool,
        skip_existing: bool,
    ) -> Result<()> {
        let parsed = mapper::parse(&file.name);
        if parsed.pattern == FilenamePattern::Invalid {
            debug!(file_id = %file.id, name = %file.name, "Filename needs review");
            self.update(file, FileStatus::NeedsReview, UpdateFields {
                error: parsed.error.clone(),
                ..Default::default()
            })
            .await;
            self.notify(&file.name, FileStatus::NeedsReview);
            return Ok(());
        }

        // Resolve observations. Missing ids are simply absent; query errors
        // fail the file, auth errors fail the run.
        self.limiter.acquire().await;
        let observations = match self
            .api
            .get_observations_by_sequential_ids(&parsed.sequential_ids)
            .await
        {
            Ok(observations) => observations,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                self.update(file, FileStatus::Failed, UpdateFields {
                    sequential_ids: Some(parsed.sequential_ids.clone()),
                    error: Some(format!("Observation query failed: {e}")),
                    ..Default::default()
                })
                .await;
                self.notify(&file.name, FileStatus::Failed);
                return Ok(());
            }
        };

        // Keep observation order aligned with the filename's id order.
        let matched: Vec<(u64, &crate::targets::Observation)> = parsed
            .sequential_ids
            .iter()
            .filter_map(|id| observations.get(id).map(|obs| (*id, obs)))
            .collect();

        if matched.is_empty() {
            self.update(file, FileStatus::Orphan, UpdateFields {
                sequential_ids: Some(parsed.sequential_ids.clone()),
                error: Some("No matching observations found".to_string()),
                ..Default::default()
            })
            .await;
            self.notify(&file.name, FileStatus::Orphan);
            return Ok(());
        }

        let observation_ids: Vec<String> = matched.iter().map(|(_, o)| o.id.clone()).collect();

        // The key is derived from the first matched observation even for
        // multi-id files, so it stays stable across retries.
        let key = mapper::build_s3_key(&matched[0].1.id, &file.name);
        let url = self.storage.get_url(&key);

        if skip_existing {
            self.limiter.acquire().await;
            match self.api.get_media_by_url(&url).await {
                Ok(Some(existing)) => {
                    debug!(file_id = %file.id, url = %url, "Media already exists, skipping");
                    self.update(file, FileStatus::Completed, UpdateFields {
                        sequential_ids: Some(parsed.sequential_ids.clone()),
                        observation_ids: Some(observation_ids),
                        s3_url: Some(url),
                        media_ids: Some(vec![existing.id]),
                        error: None,
                    })
                    .await;
                    self.notify(&file.name, FileStatus::Completed);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) if e.is_auth() => return Err(e),
                // Skip-existing is a best-effort optimization; a failed
                // check must not fail the file.
                Err(e) => {
                    warn!(file_id = %file.id, error = %e, "Existing-media check failed, continuing")
                }
            }
        }

        if dry_run {
            self.update(file, FileStatus::Completed, UpdateFields {
                sequential_ids: Some(parsed.sequential_ids.clone()),
                observation_ids: Some(observation_ids),
                error: None,
                ..Default::default()
            })
            .await;
            self.notify(&file.name, FileStatus::Completed);
            return Ok(());
        }

        let data = match self.download_with_retry(&file.id).await {
            Ok(data) => data,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                self.update(file, FileStatus::Failed, UpdateFields {
                    sequential_ids: Some(parsed.sequential_ids.clone()),
                    error: Some(format!("Download failed: {e}")),
                    ..Default::default()
                })
                .await;
                self.notify(&file.name, FileStatus::Failed);
                return Ok(());
            }
        };
        self.update(file, FileStatus::Downloaded, UpdateFields {
            sequential_ids: Some(parsed.sequential_ids.clone()),
            observation_ids: Some(observation_ids.clone()),
            error: None,
            ..Default::default()
        })
        .await;

        let (media_type, content_type) = match (
            media::get_media_type(&parsed.extension),
            media::get_content_type(&parsed.extension),
        ) {
            (Ok(media_type), Ok(content_type)) => (media_type, content_type),
            (Err(e), _) | (_, Err(e)) => {
                self.update(file, FileStatus::Failed, UpdateFields {
                    error: Some(e.to_string()),
                    ..Default::default()
                })
                .await;
                self.notify(&file.name, FileStatus::Failed);
                return Ok(());
            }
        };

        let s3_url = match self.storage.upload_file(data, &key, content_type).await {
            Ok(url) => url,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                self.update(file, FileStatus::Failed, UpdateFields {
                    error: Some(format!("Upload failed: {e}")),
                    ..Default::default()
                })
                .await;
                self.notify(&file.name, FileStatus::Failed);
                return Ok(());
            }
        };
        self.update(file, FileStatus::Uploaded, UpdateFields {
            s3_url: Some(s3_url.clone()),
            error: None,
            ..Default::default()
        })
        .await;

        // Create one media record per matched observation, accumulating
        // successes and failures independently.
        let mut media_ids = Vec::new();
        let mut linked_observation_ids = Vec::new();
        let mut failed_sequential_ids = Vec::new();
        for (sequential_id, observation) in &matched {
            self.limiter.acquire().await;
            match self
                .api
                .create_media(
                    &s3_url,
                    &observation.id,
                    media_type,
                    self.options.default_media_public,
                )
                .await
            {
                Ok(media) => {
                    media_ids.push(media.id);
                    linked_observation_ids.push(observation.id.clone());
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!(
                        file_id = %file.id,
                        sequential_id,
                        error = %e,
                        "Media creation failed"
                    );
                    failed_sequential_ids.push(*sequential_id);
                }
            }
        }

        let status = if media_ids.is_empty() {
            self.update(file, FileStatus::Failed, UpdateFields {
                error: Some("Failed to create any Media records".to_string()),
                ..Default::default()
            })
            .await;
            FileStatus::Failed
        } else if !failed_sequential_ids.is_empty() {
            self.update(file, FileStatus::Partial, UpdateFields {
                observation_ids: Some(linked_observation_ids),
                media_ids: Some(media_ids),
                error: Some(format!("Failed for sequential IDs: {failed_sequential_ids:?}")),
                ..Default::default()
            })
            .await;
            FileStatus::Partial
        } else {
            self.update(file, FileStatus::Completed, UpdateFields {
                observation_ids: Some(linked_observation_ids),
                media_ids: Some(media_ids),
                error: None,
                ..Default::default()
            })
            .await;
            FileStatus::Completed
        };
        self.notify(&file.name, status);
        Ok(())
    }

    /// Per-status counts plus the declared total.
    pub async fn get_summary(&self) -> MigrationSummary {
        let tracker = self.tracker.lock().await;
        MigrationSummary {
            total: tracker.total_files(),
            counts: tracker.get_summary(),
        }
    }

    /// Download with up to `retry_attempts` total attempts. Rate-limit
    /// responses honor the server's retry-after hint when present; all other
    /// transient failures use exponential backoff with jitter in [0, 1) s.
    async fn download_with_retry(&self, file_id: &str) -> Result<Vec<u8>> {
        let mut delay = self.options.retry_delay;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.source.download_file(file_id).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) if attempt >= self.options.retry_attempts => return Err(e),
                Err(e) => {
                    // Servers can send garbage hints; only a finite,
                    // non-negative value overrides the backoff schedule.
                    let hint = e.retry_after().filter(|h| h.is_finite() && *h >= 0.0);
                    let wait = match hint {
                        Some(hint) => Duration::from_secs_f64(hint),
                        None => delay + Duration::from_secs_f64(fastrand::f64()),
                    };
                    warn!(
                        file_id,
                        attempt,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Download attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn update(&self, file: &DriveFile, status: FileStatus, fields: UpdateFields) {
        self.tracker
            .lock()
            .await
            .update_file(&file.id, &file.name, status, fields);
    }

    fn notify(&self, filename: &str, status: FileStatus) {
        if let Some(callback) = &self.callback {
            callback(filename, status);
        }
    }

    /// Count a completed file and flush the snapshot every
    /// [`SAVE_INTERVAL`]. The counter and the flush share one lock so
    /// concurrent completions cannot interleave a save.
    async fn checkpoint(&self) -> Result<()> {
        let mut processed = self.processed_since_save.lock().await;
        *processed += 1;
        if *processed >= SAVE_INTERVAL {
            *processed = 0;
            self.tracker.lock().await.save()?;
        }
        Ok(())
    }
}

/// Register a newly-seen file: invalid names go straight to needs-review
/// (no retry can fix an unparseable name), everything else starts pending.
fn register_file(tracker: &mut ProgressTracker, file: &DriveFile) {
    let parsed = mapper::parse(&file.name);
    if parsed.pattern == FilenamePattern::Invalid {
        tracker.update_file(&file.id, &file.name, FileStatus::NeedsReview, UpdateFields {
            error: parsed.error,
            ..Default::default()
        });
    } else {
        tracker.update_file(&file.id, &file.name, FileStatus::Pending, UpdateFields {
            sequential_ids: Some(parsed.sequential_ids),
            ..Default::default()
        });
    }
}

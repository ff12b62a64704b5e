//! In-memory fakes for the engine's source and target seams, plus a test
//! harness that wires them together.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use migrator::migration::{EngineOptions, MigrationEngine, ProgressTracker};
use migrator::sources::{DriveFile, FileSource};
use migrator::targets::{Media, MediaType, ObjectStorage, Observation, ObservationApi};
use migrator::{MigratorError, Result};

/// Failure a fake can be scripted to return.
pub enum FakeFailure {
    Auth,
    RateLimit(Option<f64>),
    Download(String),
    Upload(String),
    Query(String),
}

impl FakeFailure {
    pub fn into_error(self) -> MigratorError {
        match self {
            FakeFailure::Auth => MigratorError::Authentication {
                provider: "fake".to_string(),
                message: "token expired".to_string(),
            },
            FakeFailure::RateLimit(retry_after) => MigratorError::RateLimited {
                message: "rate limited".to_string(),
                retry_after,
            },
            FakeFailure::Download(message) => MigratorError::Download(message),
            FakeFailure::Upload(message) => MigratorError::Upload(message),
            FakeFailure::Query(message) => MigratorError::GraphQL {
                operation: "query".to_string(),
                message,
            },
        }
    }
}

pub fn drive_file(id: &str, name: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "application/octet-stream".to_string(),
        size: 4,
        parent_id: Some("folder".to_string()),
    }
}

pub fn observation(sequential_id: u64) -> Observation {
    Observation {
        id: format!("obs-{sequential_id}"),
        sequential_id,
    }
}

/// File source backed by a fixed file list. Downloads and metadata fetches
/// can be scripted to fail; scripted failures are consumed in order, and an
/// empty script means success.
#[derive(Default)]
pub struct FakeSource {
    files: Mutex<Vec<DriveFile>>,
    download_failures: Mutex<VecDeque<FakeFailure>>,
    metadata_failures: Mutex<HashMap<String, FakeFailure>>,
    pub download_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(files: Vec<DriveFile>) -> Self {
        Self {
            files: Mutex::new(files),
            ..Default::default()
        }
    }

    pub fn push_download_failure(&self, failure: FakeFailure) {
        self.download_failures.lock().unwrap().push_back(failure);
    }

    pub fn fail_metadata_for(&self, file_id: &str, failure: FakeFailure) {
        self.metadata_failures
            .lock()
            .unwrap()
            .insert(file_id.to_string(), failure);
    }
}

#[async_trait]
impl FileSource for FakeSource {
    async fn list_files(&self, _folder_id: &str) -> Result<Vec<DriveFile>> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.download_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        Ok(b"file-bytes".to_vec())
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.metadata_failures.lock().unwrap().remove(file_id) {
            return Err(failure.into_error());
        }
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .ok_or_else(|| MigratorError::Download(format!("no such file: {file_id}")))
    }
}

/// Object storage that records uploads in memory.
#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<(String, usize, String)>>,
    upload_failures: Mutex<VecDeque<FakeFailure>>,
}

impl FakeStorage {
    pub fn push_upload_failure(&self, failure: FakeFailure) {
        self.upload_failures.lock().unwrap().push_back(failure);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_file(&self, data: Vec<u8>, key: &str, content_type: &str) -> Result<String> {
        if let Some(failure) = self.upload_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), data.len(), content_type.to_string()));
        Ok(self.get_url(key))
    }

    fn get_url(&self, key: &str) -> String {
        format!("https://bucket.s3.us-east-1.amazonaws.com/{key}")
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .any(|(k, _, _)| k == key))
    }
}

/// Observation API over an in-memory observation table. Created media
/// records get sequential ids (`m-1`, `m-2`, ...). Creation can be scripted
/// to fail per observation, queries and existence checks per call.
#[derive(Default)]
pub struct FakeApi {
    observations: Mutex<HashMap<u64, Observation>>,
    pub created: Mutex<Vec<Media>>,
    existing_media: Mutex<HashMap<String, Media>>,
    query_failures: Mutex<VecDeque<FakeFailure>>,
    create_failures: Mutex<HashMap<String, FakeFailure>>,
    media_check_failures: Mutex<VecDeque<FakeFailure>>,
    next_media_id: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub media_check_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations: Mutex::new(
                observations
                    .into_iter()
                    .map(|o| (o.sequential_id, o))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn push_query_failure(&self, failure: FakeFailure) {
        self.query_failures.lock().unwrap().push_back(failure);
    }

    pub fn fail_create_for(&self, observation_id: &str, failure: FakeFailure) {
        self.create_failures
            .lock()
            .unwrap()
            .insert(observation_id.to_string(), failure);
    }

    pub fn push_media_check_failure(&self, failure: FakeFailure) {
        self.media_check_failures.lock().unwrap().push_back(failure);
    }

    pub fn seed_existing_media(&self, media: Media) {
        self.existing_media
            .lock()
            .unwrap()
            .insert(media.url.clone(), media);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl ObservationApi for FakeApi {
    async fn get_observations_by_sequential_ids(
        &self,
        sequential_ids: &[u64],
    ) -> Result<HashMap<u64, Observation>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.query_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        let table = self.observations.lock().unwrap();
        Ok(sequential_ids
            .iter()
            .filter_map(|id| table.get(id).map(|o| (*id, o.clone())))
            .collect())
    }

    async fn create_media(
        &self,
        url: &str,
        observation_id: &str,
        media_type: MediaType,
        is_public: bool,
    ) -> Result<Media> {
        if let Some(failure) = self.create_failures.lock().unwrap().remove(observation_id) {
            return Err(failure.into_error());
        }
        let id = format!("m-{}", self.next_media_id.fetch_add(1, Ordering::SeqCst) + 1);
        let media = Media {
            id,
            url: url.to_string(),
            observation_id: observation_id.to_string(),
            media_type,
            is_public,
        };
        self.created.lock().unwrap().push(media.clone());
        Ok(media)
    }

    async fn get_media_by_url(&self, url: &str) -> Result<Option<Media>> {
        self.media_check_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.media_check_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        Ok(self.existing_media.lock().unwrap().get(url).cloned())
    }
}

/// Wires the fakes to an engine over a temp progress directory.
pub struct TestHarness {
    pub source: Arc<FakeSource>,
    pub storage: Arc<FakeStorage>,
    pub api: Arc<FakeApi>,
    pub tracker: Arc<AsyncMutex<ProgressTracker>>,
    _progress_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(files: Vec<DriveFile>, observations: Vec<Observation>) -> Self {
        let progress_dir = tempfile::tempdir().unwrap();
        Self {
            source: Arc::new(FakeSource::new(files)),
            storage: Arc::new(FakeStorage::default()),
            api: Arc::new(FakeApi::new(observations)),
            tracker: Arc::new(AsyncMutex::new(ProgressTracker::new(progress_dir.path()))),
            _progress_dir: progress_dir,
        }
    }

    /// Options that keep tests fast: a wide-open rate limit and a short
    /// retry delay.
    pub fn options() -> EngineOptions {
        EngineOptions {
            retry_delay: std::time::Duration::from_millis(10),
            requests_per_second: 10_000.0,
            burst_size: 100,
            ..EngineOptions::default()
        }
    }

    pub fn engine(&self) -> Arc<MigrationEngine> {
        self.engine_with(Self::options())
    }

    pub fn engine_with(&self, options: EngineOptions) -> Arc<MigrationEngine> {
        Arc::new(self.build(options))
    }

    pub fn build(&self, options: EngineOptions) -> MigrationEngine {
        MigrationEngine::new(
            Arc::clone(&self.source) as Arc<dyn FileSource>,
            Arc::clone(&self.storage) as Arc<dyn ObjectStorage>,
            Arc::clone(&self.api) as Arc<dyn ObservationApi>,
            Arc::clone(&self.tracker),
            options,
        )
    }
}

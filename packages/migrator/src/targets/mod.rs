//! Target seams: object storage and the observation API.
//!
//! The engine depends on these traits only; the Amplify-backed
//! implementations adapt the client crates and fold their errors into
//! [`MigratorError`](crate::error::MigratorError) so the auth/rate-limit
//! classification survives the seam.

use std::collections::HashMap;

use async_trait::async_trait;

use amplify_client::{AmplifyError, GraphQLClient, StorageClient};
pub use amplify_client::{Media, MediaType, Observation};

use crate::error::{MigratorError, Result};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload bytes to `key`, returning the object's public URL.
    async fn upload_file(&self, data: Vec<u8>, key: &str, content_type: &str) -> Result<String>;

    /// The URL an object at `key` would be served from. Pure, no I/O.
    fn get_url(&self, key: &str) -> String;

    /// Whether an object already exists at `key`.
    async fn file_exists(&self, key: &str) -> Result<bool>;
}

#[async_trait]
pub trait ObservationApi: Send + Sync {
    /// Observations matching each sequential id. Ids with no match are
    /// absent from the map; that is not an error.
    async fn get_observations_by_sequential_ids(
        &self,
        sequential_ids: &[u64],
    ) -> Result<HashMap<u64, Observation>>;

    /// Create the media record linking an uploaded URL to an observation.
    async fn create_media(
        &self,
        url: &str,
        observation_id: &str,
        media_type: MediaType,
        is_public: bool,
    ) -> Result<Media>;

    /// Find an existing media record for a URL, if any.
    async fn get_media_by_url(&self, url: &str) -> Result<Option<Media>>;
}

/// Amplify storage gateway as object storage.
pub struct AmplifyStorage {
    client: StorageClient,
}

impl AmplifyStorage {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for AmplifyStorage {
    async fn upload_file(&self, data: Vec<u8>, key: &str, content_type: &str) -> Result<String> {
        self.client
            .upload_file(data, key, content_type)
            .await
            .map_err(|e| match e {
                // Transport failures on the upload path are upload failures,
                // not query failures.
                AmplifyError::Http(e) => MigratorError::Upload(e.to_string()),
                other => other.into(),
            })
    }

    fn get_url(&self, key: &str) -> String {
        self.client.get_url(key)
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        Ok(self.client.file_exists(key).await?)
    }
}

/// AppSync as the observation API.
pub struct AmplifyApi {
    client: GraphQLClient,
}

impl AmplifyApi {
    pub fn new(client: GraphQLClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObservationApi for AmplifyApi {
    async fn get_observations_by_sequential_ids(
        &self,
        sequential_ids: &[u64],
    ) -> Result<HashMap<u64, Observation>> {
        Ok(self
            .client
            .get_observations_by_sequential_ids(sequential_ids)
            .await?)
    }

    async fn create_media(
        &self,
        url: &str,
        observation_id: &str,
        media_type: MediaType,
        is_public: bool,
    ) -> Result<Media> {
        Ok(self
            .client
            .create_media(url, observation_id, media_type, is_public)
            .await?)
    }

    async fn get_media_by_url(&self, url: &str) -> Result<Option<Media>> {
        Ok(self.client.get_media_by_url(url).await?)
    }
}

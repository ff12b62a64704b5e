//! File source seam.
//!
//! The engine only sees [`FileSource`]; the Drive-backed implementation is
//! swapped for in-memory fakes in tests.

use async_trait::async_trait;

use drive_client::DriveClient;
pub use drive_client::DriveFile;

use crate::error::Result;

#[async_trait]
pub trait FileSource: Send + Sync {
    /// List every file under a folder, recursing into sub-folders.
    async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>>;

    /// Download a file's bytes.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Fetch fresh metadata for one file. Used during resume, where the
    /// snapshot may be long out of date.
    async fn get_file_metadata(&self, file_id: &str) -> Result<DriveFile>;
}

/// Google Drive as a file source.
pub struct DriveSource {
    client: DriveClient,
}

impl DriveSource {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileSource for DriveSource {
    async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        Ok(self.client.list_files(folder_id).await?)
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        Ok(self.client.download_file(file_id).await?)
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        Ok(self.client.get_file_metadata(file_id).await?)
    }
}

//! Pure Google Drive REST API client.
//!
//! A minimal client for the Drive v3 API. Supports recursive folder listing
//! with pagination, byte downloads, and metadata lookups. Token acquisition
//! is the caller's problem; this client just sends the bearer token it was
//! given.
//!
//! # Example
//!
//! ```rust,ignore
//! use drive_client::DriveClient;
//!
//! let client = DriveClient::new(access_token);
//! for file in client.list_files("folder-id").await? {
//!     println!("{} ({})", file.name, file.mime_type);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{DriveError, Result};
pub use types::DriveFile;

use types::{FileListPage, FileResource};

const BASE_URL: &str = "https://www.googleapis.com/drive/v3";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,parents)";

pub struct DriveClient {
    client: reqwest::Client,
    token: String,
}

impl DriveClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// List all non-folder files under a folder, recursing into sub-folders.
    ///
    /// Every file is returned regardless of type; filtering media from
    /// non-media is left to the caller so that unexpected files can still be
    /// surfaced for review.
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut folders = vec![folder_id.to_string()];

        while let Some(current) = folders.pop() {
            let mut page_token: Option<String> = None;
            loop {
                let page = self.list_page(&current, page_token.as_deref()).await?;
                for resource in page.files {
                    if resource.mime_type == FOLDER_MIME_TYPE {
                        folders.push(resource.id);
                    } else {
                        files.push(resource.into_drive_file());
                    }
                }
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        tracing::info!(folder_id, count = files.len(), "Listed Drive files");
        Ok(files)
    }

    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<FileListPage> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let mut request = self
            .client
            .get(format!("{}/files", BASE_URL))
            .bearer_auth(&self.token)
            .query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", "1000"),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let resp = request.send().await?;
        let resp = check_status(resp, folder_id).await?;
        Ok(resp.json().await?)
    }

    /// Download a file's content as bytes.
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(format!("{}/files/{}", BASE_URL, file_id))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let resp = check_status(resp, file_id).await?;
        let bytes = resp.bytes().await?;
        tracing::debug!(file_id, size = bytes.len(), "Downloaded Drive file");
        Ok(bytes.to_vec())
    }

    /// Fetch metadata for a single file.
    pub async fn get_file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        let resp = self
            .client
            .get(format!("{}/files/{}", BASE_URL, file_id))
            .bearer_auth(&self.token)
            .query(&[("fields", "id,name,mimeType,size,parents")])
            .send()
            .await?;

        let resp = check_status(resp, file_id).await?;
        let resource: FileResource = resp.json().await?;
        Ok(resource.into_drive_file())
    }

    /// Look up a folder's display name.
    pub async fn get_folder_name(&self, folder_id: &str) -> Result<String> {
        Ok(self.get_file_metadata(folder_id).await?.name)
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_status(resp: reqwest::Response, resource: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status.as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0);
        return Err(DriveError::RateLimited { retry_after });
    }

    let body = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(DriveError::Auth(body)),
        404 => Err(DriveError::NotFound(resource.to_string())),
        code => Err(DriveError::Api {
            status: code,
            message: body,
        }),
    }
}

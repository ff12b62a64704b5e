//! Storage gateway client.
//!
//! Talks to an S3-compatible HTTP gateway that accepts the Cognito id token
//! as a bearer credential: PUT to write an object, HEAD to probe existence,
//! DELETE to remove. Public object URLs follow the virtual-hosted S3 form,
//! derived without I/O.

use crate::error::{AmplifyError, Result};

pub struct StorageClient {
    client: reqwest::Client,
    bucket: String,
    region: String,
    endpoint: String,
    id_token: String,
}

impl StorageClient {
    pub fn new(bucket: String, region: String, id_token: String) -> Self {
        let endpoint = format!("https://{}.s3.{}.amazonaws.com", bucket, region);
        Self::with_endpoint(bucket, region, endpoint, id_token)
    }

    /// Point the client at a non-default gateway endpoint (local stacks,
    /// test servers).
    pub fn with_endpoint(
        bucket: String,
        region: String,
        endpoint: String,
        id_token: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket,
            region,
            endpoint,
            id_token,
        }
    }

    /// The public URL an object at `key` will be served from. Pure.
    pub fn get_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }

    /// Upload bytes to `key`, returning the object's public URL.
    pub async fn upload_file(&self, data: Vec<u8>, key: &str, content_type: &str) -> Result<String> {
        let size = data.len();
        let resp = self
            .client
            .put(format!("{}/{}", self.endpoint, key))
            .bearer_auth(&self.id_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => {
                let body = resp.text().await.unwrap_or_default();
                return Err(AmplifyError::Auth(body));
            }
            _ if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(AmplifyError::Upload {
                    key: key.to_string(),
                    message: format!("HTTP {}: {}", status, body),
                });
            }
            _ => {}
        }

        tracing::debug!(key, size, content_type, "Uploaded object");
        Ok(self.get_url(key))
    }

    /// Whether an object already exists at `key`.
    pub async fn file_exists(&self, key: &str) -> Result<bool> {
        let resp = self
            .client
            .head(format!("{}/{}", self.endpoint, key))
            .bearer_auth(&self.id_token)
            .send()
            .await?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => Err(AmplifyError::Auth(format!("HTTP {status}"))),
            404 => Ok(false),
            _ if status.is_success() => Ok(true),
            code => Err(AmplifyError::Upload {
                key: key.to_string(),
                message: format!("existence check returned HTTP {code}"),
            }),
        }
    }

    /// Delete the object at `key`. Deleting a missing object is not an error.
    pub async fn delete_file(&self, key: &str) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}/{}", self.endpoint, key))
            .bearer_auth(&self.id_token)
            .send()
            .await?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => Err(AmplifyError::Auth(format!("HTTP {status}"))),
            404 => Ok(()),
            _ if status.is_success() => Ok(()),
            code => Err(AmplifyError::Upload {
                key: key.to_string(),
                message: format!("delete returned HTTP {code}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_use_the_virtual_hosted_form() {
        let client = StorageClient::new(
            "amplify-media".to_string(),
            "us-east-1".to_string(),
            "token".to_string(),
        );
        assert_eq!(
            client.get_url("media/obs-1/6602.jpg"),
            "https://amplify-media.s3.us-east-1.amazonaws.com/media/obs-1/6602.jpg"
        );
    }
}

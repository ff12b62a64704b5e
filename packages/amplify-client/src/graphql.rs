//! AppSync GraphQL client for the Observation/Media schema.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AmplifyError, Result};
use crate::types::{Media, MediaType, Observation};

const OBSERVATION_BY_SEQUENTIAL_ID: &str = r#"
query ObservationBySequentialId($sequentialId: Int!) {
  listObservations(filter: { sequentialId: { eq: $sequentialId } }, limit: 1) {
    items { id sequentialId }
  }
}
"#;

const CREATE_MEDIA: &str = r#"
mutation CreateMedia($input: CreateMediaInput!) {
  createMedia(input: $input) {
    id url observationID type isAvailableForPublicUse
  }
}
"#;

const MEDIA_BY_URL: &str = r#"
query MediaByUrl($url: String!) {
  listMedia(filter: { url: { eq: $url } }, limit: 1) {
    items { id url observationID type isAvailableForPublicUse }
  }
}
"#;

const MEDIA_FOR_OBSERVATION: &str = r#"
query MediaForObservation($observationId: ID!) {
  listMedia(filter: { observationID: { eq: $observationId } }) {
    items { id url observationID type isAvailableForPublicUse }
  }
}
"#;

const DELETE_MEDIA: &str = r#"
mutation DeleteMedia($input: DeleteMediaInput!) {
  deleteMedia(input: $input) { id }
}
"#;

/// One entry of the `errors` array in a GraphQL response.
#[derive(Debug, Deserialize)]
struct GraphQLErrorEntry {
    message: String,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQLErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct ItemPage<T> {
    items: Vec<T>,
}

pub struct GraphQLClient {
    client: reqwest::Client,
    endpoint: String,
    id_token: String,
}

impl GraphQLClient {
    pub fn new(endpoint: String, id_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            id_token,
        }
    }

    /// Look up the observation for one sequential id, if any exists.
    pub async fn get_observation_by_sequential_id(
        &self,
        sequential_id: u64,
    ) -> Result<Option<Observation>> {
        let page: ItemPage<Observation> = self
            .execute(
                "ObservationBySequentialId",
                OBSERVATION_BY_SEQUENTIAL_ID,
                json!({ "sequentialId": sequential_id }),
                "listObservations",
            )
            .await?;
        Ok(page.items.into_iter().next())
    }

    /// Look up observations for each sequential id. Ids with no matching
    /// observation are simply absent from the result; that is not an error.
    pub async fn get_observations_by_sequential_ids(
        &self,
        sequential_ids: &[u64],
    ) -> Result<HashMap<u64, Observation>> {
        let mut found = HashMap::new();
        for &sequential_id in sequential_ids {
            if let Some(obs) = self.get_observation_by_sequential_id(sequential_id).await? {
                found.insert(sequential_id, obs);
            }
        }
        Ok(found)
    }

    /// Create a media record linking an uploaded URL to an observation.
    pub async fn create_media(
        &self,
        url: &str,
        observation_id: &str,
        media_type: MediaType,
        is_public: bool,
    ) -> Result<Media> {
        let input = json!({
            "url": url,
            "observationID": observation_id,
            "type": media_type,
            "isAvailableForPublicUse": is_public,
        });
        let media: Media = self
            .execute(
                "CreateMedia",
                CREATE_MEDIA,
                json!({ "input": input }),
                "createMedia",
            )
            .await?;
        tracing::debug!(media_id = %media.id, observation_id, "Created media record");
        Ok(media)
    }

    /// Find the media record for an uploaded URL, if one exists.
    pub async fn get_media_by_url(&self, url: &str) -> Result<Option<Media>> {
        let page: ItemPage<Media> = self
            .execute(
                "MediaByUrl",
                MEDIA_BY_URL,
                json!({ "url": url }),
                "listMedia",
            )
            .await?;
        Ok(page.items.into_iter().next())
    }

    /// List all media attached to an observation.
    pub async fn list_media_for_observation(&self, observation_id: &str) -> Result<Vec<Media>> {
        let page: ItemPage<Media> = self
            .execute(
                "MediaForObservation",
                MEDIA_FOR_OBSERVATION,
                json!({ "observationId": observation_id }),
                "listMedia",
            )
            .await?;
        Ok(page.items)
    }

    /// Delete a media record by id.
    pub async fn delete_media(&self, media_id: &str) -> Result<()> {
        let _: Value = self
            .execute(
                "DeleteMedia",
                DELETE_MEDIA,
                json!({ "input": { "id": media_id } }),
                "deleteMedia",
            )
            .await?;
        Ok(())
    }

    /// Execute one GraphQL operation and extract `data.{field}`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        field: &str,
    ) -> Result<T> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.id_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => {
                let body = resp.text().await.unwrap_or_default();
                return Err(AmplifyError::Auth(body));
            }
            429 => {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|secs| secs.is_finite() && *secs >= 0.0);
                return Err(AmplifyError::RateLimited { retry_after });
            }
            _ if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(AmplifyError::Query {
                    operation: operation.to_string(),
                    message: format!("HTTP {}: {}", status, body),
                });
            }
            _ => {}
        }

        let envelope: GraphQLResponse = resp.json().await?;
        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            if errors
                .iter()
                .any(|e| matches!(&e.error_type, Some(t) if t.contains("Unauthorized")))
            {
                return Err(AmplifyError::Auth(errors[0].message.clone()));
            }
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(AmplifyError::Query {
                operation: operation.to_string(),
                message: messages.join("; "),
            });
        }

        let data = envelope.data.ok_or_else(|| AmplifyError::Query {
            operation: operation.to_string(),
            message: "response contained neither data nor errors".to_string(),
        })?;
        let value = data.get(field).cloned().ok_or_else(|| AmplifyError::Query {
            operation: operation.to_string(),
            message: format!("response data missing field {field}"),
        })?;
        serde_json::from_value(value).map_err(|e| AmplifyError::Query {
            operation: operation.to_string(),
            message: format!("could not decode response: {e}"),
        })
    }
}

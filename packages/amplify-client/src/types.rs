use serde::{Deserialize, Serialize};

/// Kind of media asset, as modeled by the Amplify schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Image,
    Video,
}

/// An observation record. Files map onto observations via the sequential id
/// embedded in their filenames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(rename = "sequentialId")]
    pub sequential_id: u64,
}

/// A media record linking an uploaded object's URL to an observation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Media {
    pub id: String,
    pub url: String,
    #[serde(rename = "observationID")]
    pub observation_id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(rename = "isAvailableForPublicUse")]
    pub is_public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_deserializes_from_schema_field_names() {
        let media: Media = serde_json::from_str(
            r#"{"id":"m-1","url":"https://x/y.jpg","observationID":"obs-1","type":"IMAGE","isAvailableForPublicUse":true}"#,
        )
        .unwrap();
        assert_eq!(media.observation_id, "obs-1");
        assert_eq!(media.media_type, MediaType::Image);
        assert!(media.is_public);
    }

    #[test]
    fn observation_deserializes_sequential_id() {
        let obs: Observation =
            serde_json::from_str(r#"{"id":"obs-9","sequentialId":6602}"#).unwrap();
        assert_eq!(obs.sequential_id, 6602);
    }
}

use serde::Deserialize;

/// A file listed from Google Drive. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub parent_id: Option<String>,
}

/// Raw file resource as returned by the Drive v3 API.
///
/// Drive serializes `size` as a decimal string, and omits it entirely for
/// folders and Google-native documents.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: Option<String>,
    pub parents: Option<Vec<String>>,
}

impl FileResource {
    pub(crate) fn into_drive_file(self) -> DriveFile {
        let size = self
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        DriveFile {
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            size,
            parent_id: self.parents.and_then(|p| p.into_iter().next()),
        }
    }
}

/// One page of a `files.list` response.
#[derive(Debug, Deserialize)]
pub(crate) struct FileListPage {
    #[serde(default)]
    pub files: Vec<FileResource>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_resource_converts_with_string_size() {
        let resource: FileResource = serde_json::from_str(
            r#"{"id":"f1","name":"6602.jpg","mimeType":"image/jpeg","size":"1024","parents":["p1"]}"#,
        )
        .unwrap();
        let file = resource.into_drive_file();
        assert_eq!(file.id, "f1");
        assert_eq!(file.size, 1024);
        assert_eq!(file.parent_id.as_deref(), Some("p1"));
    }

    #[test]
    fn missing_size_and_parents_default() {
        let resource: FileResource = serde_json::from_str(
            r#"{"id":"d1","name":"sub","mimeType":"application/vnd.google-apps.folder"}"#,
        )
        .unwrap();
        let file = resource.into_drive_file();
        assert_eq!(file.size, 0);
        assert_eq!(file.parent_id, None);
    }

    #[test]
    fn empty_list_page_deserializes() {
        let page: FileListPage = serde_json::from_str("{}").unwrap();
        assert!(page.files.is_empty());
        assert_eq!(page.next_page_token, None);
    }
}

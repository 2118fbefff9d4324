use serde::Deserialize;
use url::Url;

/// One unprocessed key from a bucket listing.
///
/// The backend speaks boto3-style field names (`Key`, `Size`, `Type`, ...);
/// `Type` is folded into [`RawStorageKey::is_prefix`] on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireObject")]
pub struct RawStorageKey {
    pub key: String,
    pub is_prefix: bool,
    pub size: Option<u64>,
    pub last_modified: Option<String>,
    /// Folder aggregate supplied by the backend, when it computed one.
    pub total_size: Option<u64>,
    pub file_count: Option<u32>,
}

impl RawStorageKey {
    pub fn object(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            is_prefix: false,
            size: Some(size),
            last_modified: None,
            total_size: None,
            file_count: None,
        }
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: true,
            size: None,
            last_modified: None,
            total_size: None,
            file_count: None,
        }
    }

    pub fn with_last_modified(mut self, value: impl Into<String>) -> Self {
        self.last_modified = Some(value.into());
        self
    }

    pub fn with_aggregates(mut self, total_size: u64, file_count: u32) -> Self {
        self.total_size = Some(total_size);
        self.file_count = Some(file_count);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Prefix,
    Object,
}

#[derive(Debug, Deserialize)]
struct WireObject {
    #[serde(rename = "Key", default)]
    key: String,
    #[serde(rename = "Size", default)]
    size: Option<u64>,
    #[serde(rename = "LastModified", default)]
    last_modified: Option<String>,
    #[serde(rename = "Type", default)]
    object_type: Option<ObjectType>,
    #[serde(rename = "TotalSize", default)]
    total_size: Option<u64>,
    #[serde(rename = "FileCount", default)]
    file_count: Option<u32>,
}

impl From<WireObject> for RawStorageKey {
    fn from(wire: WireObject) -> Self {
        Self {
            key: wire.key,
            is_prefix: wire.object_type == Some(ObjectType::Prefix),
            size: wire.size,
            last_modified: wire.last_modified,
            total_size: wire.total_size,
            file_count: wire.file_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListFilesResponse {
    #[serde(default)]
    pub files: Vec<RawStorageKey>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Status report from `GET /sync/status`, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncStatus {
    /// The job is not running (finished without a completion report,
    /// stopped, or had nothing to upload).
    Status {
        #[serde(default)]
        message: SyncMessage,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        details: Option<SyncDetails>,
    },
    Progress {
        #[serde(default)]
        message: SyncMessage,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        details: Option<SyncDetails>,
    },
    Completed {
        #[serde(default)]
        message: SyncMessage,
    },
    Error {
        #[serde(default)]
        message: SyncMessage,
    },
}

impl SyncStatus {
    pub fn message(&self) -> &SyncMessage {
        match self {
            SyncStatus::Status { message, .. }
            | SyncStatus::Progress { message, .. }
            | SyncStatus::Completed { message }
            | SyncStatus::Error { message } => message,
        }
    }
}

/// The backend sends either a bare string or `{ message, details }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SyncMessage {
    Text(String),
    Detailed {
        message: String,
        #[serde(default)]
        details: Option<SyncDetails>,
    },
}

impl Default for SyncMessage {
    fn default() -> Self {
        SyncMessage::Text(String::new())
    }
}

impl SyncMessage {
    pub fn text(&self) -> &str {
        match self {
            SyncMessage::Text(text) => text,
            SyncMessage::Detailed { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&SyncDetails> {
        match self {
            SyncMessage::Text(_) => None,
            SyncMessage::Detailed { details, .. } => details.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetails {
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub total_files: Option<u64>,
    #[serde(default)]
    pub total_size: Option<String>,
    #[serde(default)]
    pub files_scanned: Option<u64>,
    #[serde(default)]
    pub files_to_sync: Option<u64>,
}

/// Answer to `POST /sync/start` and `POST /sync/stop`: either a short
/// `{ status, message }` acknowledgement or a full status object with `type`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyncAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: SyncMessage,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamLink {
    pub url: Url,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamLinkResponse {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocalCheckResponse {
    #[serde(default)]
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_key_folds_type_into_prefix_flag() {
        let keys: Vec<RawStorageKey> = serde_json::from_str(
            r#"[
                {"Key": "Docs/", "Type": "prefix", "TotalSize": 10, "FileCount": 2},
                {"Key": "Docs/a.txt", "Size": 5, "Type": "object"},
                {"Key": "b.txt"}
            ]"#,
        )
        .unwrap();

        assert!(keys[0].is_prefix);
        assert_eq!(keys[0].total_size, Some(10));
        assert_eq!(keys[0].file_count, Some(2));
        assert!(!keys[1].is_prefix);
        assert_eq!(keys[1].size, Some(5));
        assert!(!keys[2].is_prefix);
        assert_eq!(keys[2].size, None);
    }

    #[test]
    fn sync_status_accepts_string_and_object_messages() {
        let text: SyncStatus =
            serde_json::from_str(r#"{"type": "error", "message": "boom"}"#).unwrap();
        assert_eq!(text.message().text(), "boom");

        let detailed: SyncStatus = serde_json::from_str(
            r#"{
                "type": "progress",
                "progress": 42.5,
                "message": {"message": "Uploading", "details": {"currentFile": "a.mp4", "size": "1.0 MB"}}
            }"#,
        )
        .unwrap();
        let SyncStatus::Progress {
            message, progress, ..
        } = detailed
        else {
            panic!("expected progress");
        };
        assert_eq!(progress, Some(42.5));
        assert_eq!(message.text(), "Uploading");
        assert_eq!(
            message.details().and_then(|d| d.current_file.as_deref()),
            Some("a.mp4")
        );
    }

    #[test]
    fn completed_status_ignores_extra_fields() {
        let status: SyncStatus = serde_json::from_str(
            r#"{"type": "completed", "message": "done", "progress": 100, "details": {"progress": "100%"}}"#,
        )
        .unwrap();
        assert!(matches!(status, SyncStatus::Completed { .. }));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of an uploaded file. The bytes live in the blob store under `content_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub user_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    #[serde(skip_serializing, default)]
    pub content_key: String,
    pub upload_date: DateTime<Utc>,
    /// Zero-based display rank.
    pub order: i32,
}

impl UploadedFile {
    /// `Content-Disposition` value for downloads, with quotes and control bytes removed.
    pub fn content_disposition(&self) -> String {
        let safe: String = self
            .filename
            .chars()
            .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
            .collect();
        format!("attachment; filename=\"{safe}\"")
    }
}

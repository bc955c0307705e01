use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::llm_client::Usage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeFormat {
    /// ProfileData-shaped JSON.
    #[default]
    Json,
    /// Opaque resume text.
    Text,
}

impl ResumeFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ResumeFormat::Json => "json",
            ResumeFormat::Text => "text",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(ResumeFormat::Json),
            "text" => Some(ResumeFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub model: String,
    #[serde(flatten)]
    pub usage: Usage,
    pub generated_at: DateTime<Utc>,
}

/// A generated resume. Never edited; each generation is a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResume {
    pub id: Uuid,
    pub user_id: String,
    pub profile_id: Uuid,
    pub job_ad_id: Uuid,
    pub format: ResumeFormat,
    /// JSON object for `Json`, JSON string for `Text`.
    pub content: Value,
    pub metadata: GenerationMetadata,
}

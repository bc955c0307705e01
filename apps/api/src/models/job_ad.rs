use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields the AI normalizer pulls out of a job ad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobAdFields {
    pub job_title: String,
    pub company_name: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub posted_at: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAd {
    pub id: Uuid,
    pub user_id: String,
    /// Text the fields were extracted from (pasted, uploaded, or fetched and trimmed).
    pub raw_text: String,
    pub source_url: Option<String>,
    #[serde(flatten)]
    pub fields: JobAdFields,
    pub created_at: DateTime<Utc>,
}

/// Quick label for a pasted ad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleAndCompany {
    pub title: String,
    pub company: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const DEFAULT_PROFILE_NAME: &str = "Profile 1";

/// Name given to a user's next profile when they already own `existing`.
pub fn next_profile_name(existing: usize) -> String {
    format!("Profile {}", existing + 1)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub additional_emails: Vec<String>,
    pub additional_phones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobHistoryEntry {
    pub company: String,
    pub title: String,
    #[serde(alias = "roleSummary")]
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub responsibilities: Vec<String>,
    pub accomplishments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationEntry {
    pub school: String,
    pub degree: String,
    pub dates_attended: String,
    pub gpa: String,
}

/// Structured resume content. Sequence order is display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub contact_info: ContactInfo,
    pub career_objective: String,
    pub skills: Vec<String>,
    pub job_history: Vec<JobHistoryEntry>,
    pub education: Vec<EducationEntry>,
}

const PROFILE_DATA_KEYS: [&str; 5] = [
    "contactInfo",
    "careerObjective",
    "skills",
    "jobHistory",
    "education",
];

impl ProfileData {
    /// Shallow merge: each top-level key in `patch` replaces the stored value.
    /// Unknown keys and values of the wrong shape are rejected.
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<ProfileData, String> {
        if let Some(unknown) = patch.keys().find(|k| !PROFILE_DATA_KEYS.contains(&k.as_str())) {
            return Err(format!("Unknown profile field '{unknown}'"));
        }
        let mut current = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(current))
            .map_err(|e| format!("Invalid profile data: {e}"))
    }
}

/// One named profile owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub is_default: bool,
    pub data: ProfileData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub data: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_profile_name() {
        assert_eq!(next_profile_name(0), DEFAULT_PROFILE_NAME);
        assert_eq!(next_profile_name(2), "Profile 3");
    }

    #[test]
    fn test_empty_profile_serializes_every_field() {
        let value = serde_json::to_value(ProfileData::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "contactInfo": {"email": "", "phone": "", "additionalEmails": [], "additionalPhones": []},
                "careerObjective": "",
                "skills": [],
                "jobHistory": [],
                "education": []
            })
        );
    }

    #[test]
    fn test_role_summary_alias() {
        let entry: JobHistoryEntry =
            serde_json::from_value(json!({"company": "Acme", "roleSummary": "Built things"}))
                .unwrap();
        assert_eq!(entry.description, "Built things");
        assert!(entry.responsibilities.is_empty());
    }

    #[test]
    fn test_merge_replaces_only_given_keys() {
        let mut base = ProfileData::default();
        base.career_objective = "Ship software".into();
        base.skills = vec!["Rust".into()];

        let patch = json!({"skills": ["Go", "SQL"]});
        let merged = base.merged(patch.as_object().unwrap()).unwrap();
        assert_eq!(merged.skills, vec!["Go", "SQL"]);
        assert_eq!(merged.career_objective, "Ship software");
    }

    #[test]
    fn test_merge_rejects_unknown_and_mistyped_fields() {
        let base = ProfileData::default();
        let unknown = json!({"hobbies": []});
        assert!(base.merged(unknown.as_object().unwrap()).is_err());
        let mistyped = json!({"skills": "Rust"});
        assert!(base.merged(mistyped.as_object().unwrap()).is_err());
    }
}

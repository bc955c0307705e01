pub mod handlers;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::profile::{ContactInfo, EducationEntry, JobHistoryEntry, ProfileData};

/// Builds profile data from a ParseResumeText result. The first email and
/// phone become the primary contact fields; the rest are kept as additional.
pub fn profile_from_parsed(parsed: &Map<String, Value>) -> ProfileData {
    let mut emails = strings(parsed.get("emails")).into_iter();
    let mut phones = strings(parsed.get("phones")).into_iter();

    ProfileData {
        contact_info: ContactInfo {
            email: emails.next().unwrap_or_default(),
            phone: phones.next().unwrap_or_default(),
            additional_emails: emails.collect(),
            additional_phones: phones.collect(),
        },
        career_objective: parsed
            .get("objective")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        skills: strings(parsed.get("skills")),
        job_history: entries::<JobHistoryEntry>(parsed.get("jobHistory")),
        education: entries::<EducationEntry>(parsed.get("education")),
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Keeps the entries that deserialize; a malformed one is dropped, not fatal.
fn entries<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed parsed resume entry: {e}");
                None
            }
        })
        .collect()
}

//! GPA backfill for parsed education entries.
//!
//! Models often drop GPAs. When they do, GPAs found by a regex scan of the
//! original input text are handed out by position: the first entry missing a GPA
//! gets the first GPA not already claimed, and once the scan is exhausted the
//! first GPA found is reused. This can pair a GPA with the wrong school when
//! only some schools list one; that imprecision is accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// `3.5`, `3.50/4.00`, `GPA: 3.7`, `GPA 3.8`, `3.9 / 4`.
static GPA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bGPA\s*:?\s*)?\b([0-4]\.\d{1,2}(?:\s*/\s*[0-4](?:\.\d{1,2})?)?)")
        .expect("static regex")
});

/// Every GPA-looking value in the text, in order of appearance.
pub fn scan_gpas(text: &str) -> Vec<String> {
    GPA_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<String>())
        .collect()
}

/// Leading number of a GPA string, used to tell whether a scanned GPA is
/// already present on an entry.
fn gpa_value(gpa: &str) -> &str {
    gpa.split('/').next().unwrap_or(gpa).trim()
}

/// Reads an entry's GPA, accepting the numeric form some models emit.
fn entry_gpa(entry: &Map<String, Value>) -> String {
    match entry.get("gpa") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Normalizes every entry's `gpa` to a string and fills missing ones from `source_text`.
pub fn backfill_gpas(education: &mut [Value], source_text: &str) {
    let mut missing = Vec::new();
    let mut present = Vec::new();

    for (idx, entry) in education.iter_mut().enumerate() {
        let Some(obj) = entry.as_object_mut() else {
            continue;
        };
        let gpa = entry_gpa(obj);
        if gpa.is_empty() {
            missing.push(idx);
        } else {
            present.push(gpa_value(&gpa).to_string());
        }
        obj.insert("gpa".to_string(), Value::String(gpa));
    }

    if missing.is_empty() {
        return;
    }
    let found = scan_gpas(source_text);
    let Some(first_found) = found.first().cloned() else {
        return;
    };

    let mut claimed: Vec<bool> = found
        .iter()
        .map(|g| present.iter().any(|p| p == gpa_value(g)))
        .collect();

    for idx in missing {
        let gpa = match claimed.iter().position(|c| !c) {
            Some(i) => {
                claimed[i] = true;
                found[i].clone()
            }
            None => first_found.clone(),
        };
        if let Some(obj) = education[idx].as_object_mut() {
            obj.insert("gpa".to_string(), Value::String(gpa));
        }
    }
}

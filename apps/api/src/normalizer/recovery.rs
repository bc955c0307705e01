//! Best-effort JSON recovery from untrusted model output.
//!
//! Order is fixed: strip fences and parse, then parse the span between the
//! first `{` and the last `}` of the raw text. Anything else is a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("static regex"));

static CLOSING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?```\s*$").expect("static regex"));

/// Removes a surrounding fenced code block (optionally language-tagged) and trims.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let start = OPENING_FENCE
        .find(trimmed)
        .map(|m| m.end())
        .unwrap_or(0);
    let body = &trimmed[start..];
    let end = CLOSING_FENCE
        .find(body)
        .map(|m| m.start())
        .unwrap_or(body.len());
    body[..end].trim()
}

/// Returns the parsed JSON value, or `None` when neither strategy succeeds.
pub fn recover_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(strip_code_fences(raw)) {
        return Some(value);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end]).ok()
}

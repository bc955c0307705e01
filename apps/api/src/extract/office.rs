use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::ExtractError;

/// Runs of text, run-level tabs and breaks, and paragraph ends in WordprocessingML.
static DOCX_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:(?:br|cr)\b[^>]*/>|</w:p>"#)
        .expect("static regex")
});

/// Tags that end a visual block in ODF text and therefore separate words.
static ODT_BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"</text:(?:p|h)>|<text:(?:line-break|tab|s)\b[^>]*/>"#).expect("static regex")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<[^>]*>"#).expect("static regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\s+"#).expect("static regex"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"&(?:#(\d+)|#x([0-9A-Fa-f]+)|(amp|lt|gt|quot|apos));"#).expect("static regex")
});

/// Body text of `word/document.xml`. Headers, footers and embedded objects live
/// in other parts of the container and are never read.
pub(super) fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let xml = read_zip_entry(bytes, "word/document.xml")?;

    let mut text = String::new();
    for token in DOCX_TOKEN.captures_iter(&xml) {
        match token.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => match token.get(0).map(|m| m.as_str()) {
                Some("<w:tab/>") => text.push('\t'),
                _ => text.push('\n'),
            },
        }
    }
    Ok(text.trim_end().to_string())
}

/// Lossy scrub of `content.xml`: tags removed, whitespace collapsed, ends trimmed.
pub(super) fn extract_odt(bytes: &[u8]) -> Result<String, ExtractError> {
    let xml = read_zip_entry(bytes, "content.xml")?;

    let spaced = ODT_BLOCK_TAG.replace_all(&xml, " ");
    let stripped = ANY_TAG.replace_all(&spaced, "");
    let unescaped = unescape_xml(&stripped);
    Ok(WHITESPACE.replace_all(&unescaped, " ").trim().to_string())
}

fn read_zip_entry(bytes: &[u8], name: &str) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Corrupt(format!("not a valid zip container: {e}")))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ExtractError::Corrupt(format!("container has no {name}")))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Corrupt(format!("{name} is unreadable: {e}")))?;
    Ok(xml)
}

fn unescape_xml(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            if let Some(dec) = caps.get(1) {
                return dec
                    .as_str()
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default();
            }
            if let Some(hex) = caps.get(2) {
                return u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default();
            }
            match caps.get(3).map(|m| m.as_str()) {
                Some("amp") => "&",
                Some("lt") => "<",
                Some("gt") => ">",
                Some("quot") => "\"",
                _ => "'",
            }
            .to_string()
        })
        .into_owned()
}

//! Document Text Extractor: turns an uploaded file into plain text.
//!
//! Dispatch is a fixed allow-list keyed on the declared MIME type, with the
//! filename extension consulted only when the declared type is missing or generic.
//! Output is never truncated here.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

mod office;
mod pdf;
pub mod upload;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document type '{0}'")]
    UnsupportedType(String),

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("corrupt document: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Odt,
    PlainText,
    Markdown,
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const ODT_MIME: &str = "application/vnd.oasis.opendocument.text";

impl DocumentKind {
    /// Resolves the extraction strategy for an upload.
    pub fn detect(declared_type: &str, filename_hint: &str) -> Result<Self, ExtractError> {
        let mime = declared_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/pdf" => return Ok(DocumentKind::Pdf),
            DOCX_MIME => return Ok(DocumentKind::Docx),
            ODT_MIME => return Ok(DocumentKind::Odt),
            "text/plain" => return Ok(DocumentKind::PlainText),
            "text/markdown" | "text/x-markdown" => return Ok(DocumentKind::Markdown),
            "" | "application/octet-stream" => {}
            other => return Err(ExtractError::UnsupportedType(other.to_string())),
        }

        let extension = filename_hint
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "odt" => Ok(DocumentKind::Odt),
            "txt" => Ok(DocumentKind::PlainText),
            "md" | "markdown" => Ok(DocumentKind::Markdown),
            _ => Err(ExtractError::UnsupportedType(if mime.is_empty() {
                filename_hint.to_string()
            } else {
                mime
            })),
        }
    }
}

/// Synchronous extraction. CPU-bound for PDFs; callers on the async runtime
/// should go through [`extract_document`].
pub fn extract(
    bytes: &[u8],
    declared_type: &str,
    filename_hint: &str,
) -> Result<String, ExtractError> {
    let kind = DocumentKind::detect(declared_type, filename_hint)?;
    extract_kind(kind, bytes)
}

fn extract_kind(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError> {
    debug!("Extracting {} bytes as {:?}", bytes.len(), kind);
    match kind {
        DocumentKind::Pdf => pdf::extract_pdf(bytes),
        DocumentKind::Docx => office::extract_docx(bytes),
        DocumentKind::Odt => office::extract_odt(bytes),
        DocumentKind::PlainText | DocumentKind::Markdown => String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractError::Corrupt(format!("text is not valid UTF-8: {e}"))),
    }
}

/// Validates type and size, then extracts on the blocking pool.
pub async fn extract_document(
    bytes: Bytes,
    declared_type: &str,
    filename_hint: &str,
    max_bytes: usize,
) -> Result<String, ExtractError> {
    let kind = DocumentKind::detect(declared_type, filename_hint)?;
    if bytes.len() > max_bytes {
        return Err(ExtractError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    tokio::task::spawn_blocking(move || extract_kind(kind, &bytes))
        .await
        .map_err(|e| ExtractError::Corrupt(format!("extraction task failed: {e}")))?
}

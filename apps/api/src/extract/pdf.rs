use std::panic::{catch_unwind, AssertUnwindSafe};

use super::ExtractError;

/// Extracts the text layer of a PDF in the reading order the parser reports.
/// A document without any recoverable text is treated as corrupt.
pub(super) fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // The PDF parser panics on some malformed inputs instead of returning an error.
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| ExtractError::Corrupt("PDF parser aborted on malformed input".to_string()))?
        .map_err(|e| ExtractError::Corrupt(format!("unreadable PDF: {e}")))?;

    if text.trim().is_empty() {
        return Err(ExtractError::Corrupt(
            "PDF has no extractable text layer".to_string(),
        ));
    }
    Ok(text)
}

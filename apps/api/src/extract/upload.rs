use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;

use super::extract_document;
use crate::errors::AppError;

/// A single file part pulled out of a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Reads the first part that carries a filename. Other fields are ignored.
pub async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| read_error(e, max_bytes))?;

        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(AppError::Validation(format!("Uploaded file '{filename}' is empty")));
        }

        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(AppError::Validation(
        "Request must include a file part".to_string(),
    ))
}

/// Reads the uploaded file and returns its extracted text.
pub async fn read_upload_text(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<String, AppError> {
    let upload = read_upload(multipart, max_bytes).await?;
    let text = extract_document(
        upload.bytes,
        &upload.content_type,
        &upload.filename,
        max_bytes,
    )
    .await?;
    if text.trim().is_empty() {
        return Err(AppError::CorruptDocument(format!(
            "'{}' contains no text",
            upload.filename
        )));
    }
    Ok(text)
}

/// The router's body limit sits above `max_bytes`; hitting it still reports as too large.
fn read_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            size: max_bytes.saturating_add(1),
            limit: max_bytes,
        }
    } else {
        AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
    }
}

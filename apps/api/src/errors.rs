use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::extract::ExtractError;
use crate::job_ads::fetch::FetchError;
use crate::llm_client::LlmError;
use crate::store::StoreError;

/// Longest slice of raw model output echoed back in an error body.
const RAW_EXCERPT_CHARS: usize = 2000;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Payload too large: {size} bytes exceeds {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Malformed AI response")]
    MalformedAiResponse { raw: String },

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::InvalidToken(_) => "INVALID_TOKEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::CorruptDocument(_) => "CORRUPT_DOCUMENT",
            AppError::MalformedAiResponse { .. } => "MALFORMED_AI_RESPONSE",
            AppError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message, details) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
                None,
            ),
            AppError::InvalidToken(reason) => {
                tracing::warn!("Rejected bearer token: {reason}");
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                    None,
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::UnsupportedType(kind) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("Unsupported document type: {kind}"),
                None,
            ),
            AppError::PayloadTooLarge { size, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                {
                    tracing::warn!("Rejected upload of {size} bytes");
                    format!("Upload exceeds the {limit} byte limit")
                },
                None,
            ),
            AppError::CorruptDocument(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Could not read document: {reason}"),
                None,
            ),
            AppError::MalformedAiResponse { raw } => {
                tracing::error!("AI response could not be coerced to JSON: {raw}");
                let excerpt: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
                (
                    StatusCode::BAD_GATEWAY,
                    "The AI provider returned a response that is not valid JSON".to_string(),
                    Some(json!({ "raw": excerpt })),
                )
            }
            AppError::UpstreamTimeout(what) => {
                tracing::error!("Upstream timeout: {what}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "An upstream service timed out".to_string(),
                    None,
                )
            }
            AppError::UpstreamUnavailable(what) => {
                tracing::error!("Upstream unavailable: {what}");
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service is unavailable".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Missing => AppError::Unauthenticated,
            AuthError::Invalid(reason) => AppError::InvalidToken(reason),
            AuthError::KeyFetch(reason) => {
                AppError::UpstreamUnavailable(format!("identity provider keys: {reason}"))
            }
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedType(kind) => AppError::UnsupportedType(kind),
            ExtractError::TooLarge { size, limit } => AppError::PayloadTooLarge { size, limit },
            ExtractError::Corrupt(reason) => AppError::CorruptDocument(reason),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => AppError::UpstreamTimeout("AI completion".to_string()),
            other => AppError::UpstreamUnavailable(format!("AI completion: {other}")),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(msg) => AppError::Validation(msg),
            FetchError::Timeout => AppError::UpstreamTimeout("job page fetch".to_string()),
            FetchError::Unavailable(msg) => {
                AppError::UpstreamUnavailable(format!("job page fetch: {msg}"))
            }
            FetchError::TooLarge { limit } => {
                AppError::Validation(format!("Job page exceeds the {limit} byte limit"))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Blob(msg) | StoreError::Feed(msg) => AppError::Storage(msg),
            StoreError::Decode(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::upload::read_upload_text;
use crate::normalizer::ChatReply;
use crate::routes::params::ApiJson;
use crate::state::AppState;

/// POST /api/v1/documents/parse
/// Parses an uploaded resume without storing anything.
pub async fn handle_parse_document(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Map<String, Value>>, AppError> {
    let mut multipart = multipart?;
    let text = read_upload_text(&mut multipart, state.config.max_upload_bytes).await?;
    let parsed = state.normalizer.parse_resume_text(&text).await?;
    Ok(Json(parsed.value))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub profile_id: Option<Uuid>,
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("'message' cannot be empty".into()));
    }

    let profile = match req.profile_id {
        Some(id) => Some(
            state
                .store
                .get_profile(&user, id)
                .await?
                .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?,
        ),
        None => None,
    };

    let reply = state
        .normalizer
        .chat_assist(&req.message, profile.as_ref().map(|p| &p.data))
        .await?;
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::testing::{json_request, multipart_request, TestApp};

    #[tokio::test]
    async fn test_parse_document_returns_every_resume_key() {
        let app = TestApp::new(vec![Ok(
            "```json\n{\"emails\":[\"john@x.com\"],\"skills\":[\"Go\",\"SQL\"]}\n```".to_string(),
        )]);
        let (status, parsed) = app
            .send(multipart_request(
                "/api/v1/documents/parse",
                Some("alice"),
                "resume.txt",
                "text/plain",
                b"John Doe\njohn@x.com\nSkills: Go, SQL",
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            parsed,
            json!({
                "emails": ["john@x.com"], "phones": [], "objective": "",
                "skills": ["Go", "SQL"], "education": [], "jobHistory": []
            })
        );
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_before_extraction() {
        let app = TestApp::new(vec![]);
        let big = vec![b'a'; crate::testing::MAX_UPLOAD_BYTES + 1];
        let (status, body) = app
            .send(multipart_request(
                "/api/v1/documents/parse",
                Some("alice"),
                "resume.txt",
                "text/plain",
                &big,
            ))
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_uses_owned_profile_only() {
        let app = TestApp::new(vec![Ok(
            r#"{"reply": "Quantify your impact.", "suggestions": ["Add numbers"]}"#.to_string(),
        )]);
        let (status, reply) = app
            .send(json_request(
                Method::POST,
                "/api/v1/chat",
                Some("alice"),
                json!({"message": "How can I improve my resume?"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["reply"], "Quantify your impact.");
        assert_eq!(reply["suggestions"], json!(["Add numbers"]));

        let (status, _) = app
            .send(json_request(
                Method::POST,
                "/api/v1/chat",
                Some("alice"),
                json!({"message": "hi", "profileId": uuid::Uuid::new_v4()}),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(app.llm.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_timeout_surfaces_as_gateway_timeout() {
        use crate::llm_client::LlmError;
        let app = TestApp::new(vec![Err(LlmError::Timeout), Err(LlmError::Timeout)]);
        let (status, body) = app
            .send(json_request(
                Method::POST,
                "/api/v1/chat",
                Some("alice"),
                json!({"message": "hello"}),
            ))
            .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "UPSTREAM_TIMEOUT");
    }
}

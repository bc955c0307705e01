//! Shared fixtures for unit and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::{AuthError, TokenVerifier, UserId};
use crate::config::{Config, LlmProvider};
use crate::files::feed::memory::MemoryFeed;
use crate::job_ads::fetch::JobPageFetcher;
use crate::llm_client::{CompletionProvider, LlmClient, LlmError, LlmResponse, Usage};
use crate::normalizer::Normalizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::memory::{MemoryBlobs, MemoryStore};

/// Accepts `token-<user>` and nothing else.
#[derive(Debug, Default)]
pub struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        match token.strip_prefix("token-") {
            Some(user) if !user.is_empty() => Ok(UserId::new(user)),
            _ => Err(AuthError::Invalid("unknown test token".to_string())),
        }
    }
}

/// Replays scripted completions in order and counts calls.
pub struct StubProvider {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    fn model(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("no scripted response".into())));
        next.map(|text| LlmResponse {
            text,
            model: "stub-model".to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }
}

pub fn stub_normalizer(responses: Vec<Result<String, LlmError>>) -> (Normalizer, Arc<StubProvider>) {
    let stub = Arc::new(StubProvider::new(responses));
    (Normalizer::new(LlmClient::new(stub.clone())), stub)
}

pub const MAX_UPLOAD_BYTES: usize = 1024;

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        s3_bucket: "test-bucket".into(),
        s3_endpoint: "http://unused".into(),
        aws_access_key_id: "test".into(),
        aws_secret_access_key: "test".into(),
        firebase_project_id: "test-project".into(),
        llm_provider: LlmProvider::Groq,
        llm_api_key: "test".into(),
        llm_base_url: None,
        llm_model: None,
        llm_timeout_secs: 1,
        fetch_timeout_secs: 1,
        max_upload_bytes: MAX_UPLOAD_BYTES,
        port: 0,
        rust_log: "debug".into(),
    }
}

/// The real router over in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobs>,
    pub feed: Arc<MemoryFeed>,
    pub llm: Arc<StubProvider>,
}

impl TestApp {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let feed = Arc::new(MemoryFeed::default());
        let (normalizer, llm) = stub_normalizer(responses);

        let state = AppState {
            store: store.clone(),
            blobs: blobs.clone(),
            feed: feed.clone(),
            auth: Arc::new(StaticVerifier),
            normalizer,
            fetcher: JobPageFetcher::new(Duration::from_secs(1)).unwrap(),
            config: test_config(),
        };

        Self {
            router: build_router(state),
            store,
            blobs,
            feed,
            llm,
        }
    }

    /// Sends one request and returns the status and the body parsed as JSON
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }
}

fn authorized(method: Method, uri: &str, user: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match user {
        Some(user) => builder.header(header::AUTHORIZATION, format!("Bearer token-{user}")),
        None => builder,
    }
}

pub fn empty_request(method: Method, uri: &str, user: Option<&str>) -> Request<Body> {
    authorized(method, uri, user).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    authorized(method, uri, user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

pub fn multipart_request(
    uri: &str,
    user: Option<&str>,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    authorized(Method::POST, uri, user)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

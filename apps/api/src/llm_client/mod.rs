//! LLM Client: the single point of entry for all completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call a model provider directly.
//! Providers (Groq, OpenAI-compatible gateways, Gemini) sit behind
//! [`CompletionProvider`] and are selected once at startup from config.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, LlmProvider};

pub mod gemini;
pub mod openai;
pub mod prompts;

const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.2;
/// One initial attempt plus a single retry.
const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("provider unreachable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Transport failures, rate limits and server errors are worth one more try.
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Unavailable(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_connect() {
            LlmError::Unavailable(e.to_string())
        } else {
            LlmError::Http(e)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Provider-neutral completion result.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

/// A model backend. Implementations perform exactly one HTTP call per `complete`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<LlmResponse, LlmError>;
}

/// The single LLM client used by all services.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn CompletionProvider>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let key = config.llm_api_key.clone();
        let model = config.llm_model.clone();
        let base = config.llm_base_url.clone();

        let provider: Arc<dyn CompletionProvider> = match config.llm_provider {
            LlmProvider::Groq => Arc::new(openai::OpenAiCompatible::new(
                http,
                base.unwrap_or_else(|| openai::GROQ_BASE_URL.to_string()),
                key,
                model.unwrap_or_else(|| openai::GROQ_DEFAULT_MODEL.to_string()),
            )),
            LlmProvider::OpenAi => Arc::new(openai::OpenAiCompatible::new(
                http,
                base.unwrap_or_else(|| openai::OPENAI_BASE_URL.to_string()),
                key,
                model.unwrap_or_else(|| openai::OPENAI_DEFAULT_MODEL.to_string()),
            )),
            LlmProvider::Gemini => Arc::new(gemini::Gemini::new(
                http,
                base.unwrap_or_else(|| gemini::GEMINI_BASE_URL.to_string()),
                key,
                model.unwrap_or_else(|| gemini::GEMINI_DEFAULT_MODEL.to_string()),
            )),
        };
        Ok(Self::new(provider))
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Calls the configured provider, retrying once after a short backoff on
    /// timeouts, connection failures, 429 and 5xx.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let mut attempt = 1;
        loop {
            match self.provider.complete(system, prompt).await {
                Ok(response) if response.text.trim().is_empty() => {
                    return Err(LlmError::EmptyContent)
                }
                Ok(response) => {
                    debug!(
                        "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                        response.model, response.usage.input_tokens, response.usage.output_tokens
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        "LLM call attempt {attempt} failed ({e}), retrying after {}ms...",
                        RETRY_BACKOFF.as_millis()
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Reads a non-success provider response into an `LlmError::Api`.
pub(crate) async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    LlmError::Api { status, message }
}

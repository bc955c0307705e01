//! Job-page fetcher: downloads an ad and reduces it to its main text.

use std::time::Duration;

use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

/// Longest page text handed to the normalizer.
pub const MAX_PAGE_CHARS: usize = 5000;
/// Largest response body read from a job page.
pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;
const ELLIPSIS: &str = "...";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Tried in order; the first non-empty match wins, else the whole body.
const CONTENT_SELECTORS: [&str; 2] = ["main", "[class*='description'], [id*='description']"];

const INVISIBLE_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid job ad URL: {0}")]
    InvalidUrl(String),

    #[error("job page request timed out")]
    Timeout,

    #[error("job page unavailable: {0}")]
    Unavailable(String),

    #[error("job page exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}

#[derive(Clone)]
pub struct JobPageFetcher {
    client: Client,
    max_bytes: usize,
}

impl JobPageFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_bytes: MAX_PAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches `url` and returns its main text, whitespace-collapsed and
    /// capped at [`MAX_PAGE_CHARS`] plus an ellipsis.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let url = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        info!("Fetching job page: {url}");
        let mut response = self.client.get(url.clone()).send().await.map_err(transport)?;
        if !response.status().is_success() {
            warn!("Job page {url} answered {}", response.status());
            return Err(FetchError::Unavailable(format!(
                "HTTP status {}",
                response.status()
            )));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            warn!("Job page {url} declares {:?} bytes", response.content_length());
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > self.max_bytes {
                warn!("Job page {url} exceeded {} bytes while streaming", self.max_bytes);
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        let html = String::from_utf8_lossy(&body);

        Ok(truncate_text(&main_text(&html)))
    }
}

fn transport(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unavailable(e.to_string())
    }
}

/// Best-effort main-content text of an HTML page.
pub fn main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let text = document
            .select(&selector)
            .map(visible_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            return text;
        }
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());
    visible_text(body)
}

/// Text nodes under `element` outside script-like tags, whitespace-collapsed.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut words = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE_TAGS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

pub fn truncate_text(text: &str) -> String {
    match text.char_indices().nth(MAX_PAGE_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

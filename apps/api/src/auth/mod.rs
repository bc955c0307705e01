//! Auth Gate: turns a bearer credential into a stable user identifier.
//!
//! Verifying the token only establishes *who* is calling. Record ownership is
//! re-checked by every store query, which filters on the returned [`UserId`].

use std::fmt;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AppError;
use crate::state::AppState;

pub mod firebase;

/// Opaque identity-provider user id. Partition key of every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("could not load signing keys: {0}")]
    KeyFetch(String),
}

/// Identity-provider check. Carried in `AppState` as `Arc<dyn TokenVerifier>`.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Pure verification: no session state is read or written.
pub async fn verify_bearer(
    verifier: &dyn TokenVerifier,
    token: Option<&str>,
) -> Result<UserId, AuthError> {
    match token.map(str::trim) {
        None | Some("") => Err(AuthError::Missing),
        Some(token) => verifier.verify(token).await,
    }
}

/// `Ok(None)` when the header is absent, an error when present but not a bearer credential.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::Invalid("authorization header is not ASCII".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token.trim())),
        _ => Err(AuthError::Invalid(
            "authorization header is not a bearer credential".to_string(),
        )),
    }
}

/// Caller authenticated from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers)?;
        let user = verify_bearer(state.auth.as_ref(), token).await?;
        Ok(AuthUser(user))
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Caller authenticated from the header, or from a `?token=` query parameter for
/// clients that cannot set headers (download links, `EventSource`).
#[derive(Debug, Clone)]
pub struct LinkAuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for LinkAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let query_token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|q| q.0.token);

        let token = match bearer_token(&parts.headers)? {
            Some(token) => Some(token.to_string()),
            None => query_token,
        };
        let user = verify_bearer(state.auth.as_ref(), token.as_deref()).await?;
        Ok(LinkAuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::testing::StaticVerifier;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
        assert_eq!(
            bearer_token(&headers("Bearer abc.def")).unwrap(),
            Some("abc.def")
        );
        assert_eq!(bearer_token(&headers("bearer  xyz ")).unwrap(), Some("xyz"));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_bearer_missing_and_blank() {
        let verifier = StaticVerifier::default();
        assert!(matches!(
            verify_bearer(&verifier, None).await,
            Err(AuthError::Missing)
        ));
        assert!(matches!(
            verify_bearer(&verifier, Some("   ")).await,
            Err(AuthError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_verify_bearer_delegates_to_provider() {
        let verifier = StaticVerifier::default();
        let user = verify_bearer(&verifier, Some("token-alice")).await.unwrap();
        assert_eq!(user.as_str(), "alice");
        assert!(matches!(
            verify_bearer(&verifier, Some("forged")).await,
            Err(AuthError::Invalid(_))
        ));
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{AuthError, TokenVerifier, UserId};

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Minimum spacing between key-set fetches, whatever the outcome of the last one.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Where the signing key set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// Google's published `securetoken` keys.
pub struct GoogleKeySource {
    http: reqwest::Client,
}

impl GoogleKeySource {
    pub fn new() -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl KeySource for GoogleKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        self.http
            .get(FIREBASE_JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))
    }
}

#[derive(Default)]
struct KeyCache {
    set: Option<Arc<JwkSet>>,
    last_fetch: Option<Instant>,
}

impl KeyCache {
    /// `None` means a fetch is due.
    fn lookup(&self, kid: &str) -> Option<Result<Arc<JwkSet>, AuthError>> {
        let recent = self
            .last_fetch
            .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL);
        match &self.set {
            Some(set) if recent || set.find(kid).is_some() => Some(Ok(set.clone())),
            None if recent => Some(Err(AuthError::KeyFetch(
                "signing keys unavailable, retry later".to_string(),
            ))),
            _ => None,
        }
    }
}

/// Verifies Firebase ID tokens against Google's published signing keys.
///
/// One instance is built at startup and shared by every request. Keys are fetched
/// on first use and re-fetched when a token names a key id that is not cached,
/// at most once per [`MIN_REFRESH_INTERVAL`].
pub struct FirebaseVerifier {
    project_id: String,
    source: Arc<dyn KeySource>,
    keys: RwLock<KeyCache>,
}

impl FirebaseVerifier {
    pub fn new(project_id: String) -> Result<Self, AuthError> {
        Ok(Self::with_key_source(
            project_id,
            Arc::new(GoogleKeySource::new()?),
        ))
    }

    pub fn with_key_source(project_id: String, source: Arc<dyn KeySource>) -> Self {
        Self {
            project_id,
            source,
            keys: RwLock::new(KeyCache::default()),
        }
    }

    /// The cached key set, refreshed first when `kid` is unknown and the
    /// refresh interval has passed.
    async fn keys_for(&self, kid: &str) -> Result<Arc<JwkSet>, AuthError> {
        if let Some(found) = self.keys.read().await.lookup(kid) {
            return found;
        }

        let mut cache = self.keys.write().await;
        // A concurrent request may have refreshed while this one waited.
        if let Some(found) = cache.lookup(kid) {
            return found;
        }

        cache.last_fetch = Some(Instant::now());
        match self.source.fetch().await {
            Ok(set) => {
                info!("Loaded {} Firebase signing keys", set.keys.len());
                let set = Arc::new(set);
                cache.set = Some(set.clone());
                Ok(set)
            }
            Err(e) => {
                warn!("Firebase key refresh failed: {e}");
                match &cache.set {
                    Some(set) => Ok(set.clone()),
                    None => Err(e),
                }
            }
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Invalid(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("token header has no key id".to_string()))?;

        let keys = self.keys_for(&kid).await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| AuthError::Invalid(format!("unknown key id {kid}")))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::Invalid(e.to_string()))?;

        let data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| AuthError::Invalid(e.to_string()))?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::Invalid("token has an empty subject".to_string()));
        }
        Ok(UserId::new(data.claims.sub))
    }
}

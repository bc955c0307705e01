use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::files::feed::UploadFeed;
use crate::job_ads::fetch::JobPageFetcher;
use crate::normalizer::Normalizer;
use crate::store::{BlobStore, RecordStore};

/// Shared application state injected into all route handlers via Axum extractors.
/// Every field is built once in `main` and cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub feed: Arc<dyn UploadFeed>,
    pub auth: Arc<dyn TokenVerifier>,
    pub normalizer: Normalizer,
    pub fetcher: JobPageFetcher,
    pub config: Config,
}

mod assist;
mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod files;
mod job_ads;
mod llm_client;
mod models;
mod normalizer;
mod profiles;
mod resumes;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::firebase::FirebaseVerifier;
use crate::config::Config;
use crate::db::create_pool;
use crate::files::feed::RedisFeed;
use crate::job_ads::fetch::JobPageFetcher;
use crate::llm_client::LlmClient;
use crate::normalizer::Normalizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::blob::S3BlobStore;
use crate::store::postgres::PgRecordStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (migrations run here)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis pub/sub for live upload events
    let redis = redis::Client::open(config.redis_url.clone())?;
    let feed = RedisFeed::connect(redis)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis upload feed connected");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm = LlmClient::from_config(&config).context("Failed to build LLM client")?;
    info!(
        "LLM client initialized ({:?}, model: {})",
        config.llm_provider,
        llm.model()
    );

    // Signing keys are fetched on first use
    let verifier = FirebaseVerifier::new(config.firebase_project_id.clone())
        .context("Failed to build token verifier")?;

    let fetcher = JobPageFetcher::new(Duration::from_secs(config.fetch_timeout_secs))
        .context("Failed to build job page fetcher")?;

    // Build app state
    let state = AppState {
        store: Arc::new(PgRecordStore::new(db.clone())),
        blobs: Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone())),
        feed: Arc::new(feed),
        auth: Arc::new(verifier),
        normalizer: Normalizer::new(llm),
        fetcher,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Shut down cleanly");
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

pub mod health;
pub mod params;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::assist::handlers as assist;
use crate::files::handlers as files;
use crate::job_ads::handlers as job_ads;
use crate::profiles::handlers as profiles;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

/// Headroom over the upload ceiling for multipart framing, so oversized
/// files are reported by the upload reader with a proper error body.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    let api = Router::new()
        // Profiles
        .route(
            "/profiles",
            get(profiles::handle_list_profiles).post(profiles::handle_create_profile),
        )
        .route(
            "/profiles/:id",
            get(profiles::handle_get_profile)
                .patch(profiles::handle_update_profile)
                .delete(profiles::handle_delete_profile),
        )
        .route("/profiles/:id/import", post(profiles::handle_import_resume))
        // Stateless assistance
        .route("/documents/parse", post(assist::handle_parse_document))
        .route("/chat", post(assist::handle_chat))
        // Job ads
        .route(
            "/job-ads",
            get(job_ads::handle_list_job_ads).post(job_ads::handle_create_job_ad),
        )
        .route("/job-ads/upload", post(job_ads::handle_upload_job_ad))
        .route("/job-ads/label", post(job_ads::handle_label_job_ad))
        .route(
            "/job-ads/:id",
            get(job_ads::handle_get_job_ad).delete(job_ads::handle_delete_job_ad),
        )
        .route("/job-ads/:id/extract", post(job_ads::handle_reextract_job_ad))
        // Generated resumes
        .route("/resumes", get(resumes::handle_list_resumes))
        .route("/resumes/generate", post(resumes::handle_generate_resume))
        .route(
            "/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        // Uploaded files
        .route(
            "/files",
            get(files::handle_list_files).post(files::handle_upload_file),
        )
        .route("/files/order", put(files::handle_reorder_files))
        .route("/files/stream", get(files::handle_file_stream))
        .route("/files/:id", delete(files::handle_delete_file))
        .route("/files/:id/download", get(files::handle_download_file));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

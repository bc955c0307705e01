use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, UserId};
use crate::errors::AppError;
use crate::extract::upload::read_upload_text;
use crate::models::job_ad::{JobAd, TitleAndCompany};
use crate::routes::params::{ApiJson, RecordId};
use crate::state::AppState;

fn not_found() -> AppError {
    AppError::NotFound("Job ad not found".to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateJobAdRequest {
    pub text: Option<String>,
    pub url: Option<String>,
}

/// Extracts fields first; nothing is stored unless extraction succeeded.
async fn extract_and_store(
    state: &AppState,
    user: &UserId,
    raw_text: String,
    source_url: Option<String>,
) -> Result<JobAd, AppError> {
    let fields = state.normalizer.extract_job_ad_fields(&raw_text).await?;
    let ad = JobAd {
        id: Uuid::new_v4(),
        user_id: user.to_string(),
        raw_text,
        source_url,
        fields,
        created_at: Utc::now(),
    };
    state.store.insert_job_ad(&ad).await?;
    info!(
        "Stored job ad {} ('{}' at '{}') for user {user}",
        ad.id, ad.fields.job_title, ad.fields.company_name
    );
    Ok(ad)
}

/// POST /api/v1/job-ads
/// Body is `{text}` for a pasted ad or `{url}` for a page to fetch.
pub async fn handle_create_job_ad(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateJobAdRequest>,
) -> Result<(StatusCode, Json<JobAd>), AppError> {
    let text = req.text.filter(|t| !t.trim().is_empty());
    let url = req.url.filter(|u| !u.trim().is_empty());

    let (raw_text, source_url) = match (text, url) {
        (Some(text), None) => (text, None),
        (None, Some(url)) => {
            let text = state.fetcher.fetch_text(&url).await?;
            if text.is_empty() {
                return Err(AppError::Validation(format!("No readable text at {url}")));
            }
            (text, Some(url))
        }
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "Provide either 'text' or 'url', not both".into(),
            ))
        }
        (None, None) => {
            return Err(AppError::Validation(
                "Request must include 'text' or 'url'".into(),
            ))
        }
    };

    let ad = extract_and_store(&state, &user, raw_text, source_url).await?;
    Ok((StatusCode::CREATED, Json(ad)))
}

/// POST /api/v1/job-ads/upload
pub async fn handle_upload_job_ad(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<JobAd>), AppError> {
    let mut multipart = multipart?;
    let text = read_upload_text(&mut multipart, state.config.max_upload_bytes).await?;
    let ad = extract_and_store(&state, &user, text, None).await?;
    Ok((StatusCode::CREATED, Json(ad)))
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub text: String,
}

/// POST /api/v1/job-ads/label
pub async fn handle_label_job_ad(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    ApiJson(req): ApiJson<LabelRequest>,
) -> Result<Json<TitleAndCompany>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::Validation("'text' cannot be empty".into()));
    }
    Ok(Json(state.normalizer.extract_title_and_company(&req.text).await?))
}

/// GET /api/v1/job-ads
pub async fn handle_list_job_ads(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<JobAd>>, AppError> {
    Ok(Json(state.store.list_job_ads(&user).await?))
}

/// GET /api/v1/job-ads/:id
pub async fn handle_get_job_ad(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<Json<JobAd>, AppError> {
    let ad = state.store.get_job_ad(&user, id).await?.ok_or_else(not_found)?;
    Ok(Json(ad))
}

/// POST /api/v1/job-ads/:id/extract
/// Re-runs field extraction over the stored text and overwrites the fields.
pub async fn handle_reextract_job_ad(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<Json<JobAd>, AppError> {
    let ad = state.store.get_job_ad(&user, id).await?.ok_or_else(not_found)?;
    let fields = state.normalizer.extract_job_ad_fields(&ad.raw_text).await?;
    let ad = state
        .store
        .replace_job_ad_fields(&user, id, &fields)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ad))
}

/// DELETE /api/v1/job-ads/:id
pub async fn handle_delete_job_ad(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_job_ad(&user, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

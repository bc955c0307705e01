use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{GeneratedResume, ResumeFormat};
use crate::routes::params::{ApiJson, RecordId};
use crate::state::AppState;

fn not_found() -> AppError {
    AppError::NotFound("Resume not found".to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResumeRequest {
    pub profile_id: Uuid,
    pub job_ad_id: Uuid,
    #[serde(default)]
    pub format: ResumeFormat,
}

/// POST /api/v1/resumes/generate
/// Tailors one of the caller's profiles to one of their job ads. Every call
/// stores a new resume.
pub async fn handle_generate_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<GenerateResumeRequest>,
) -> Result<(StatusCode, Json<GeneratedResume>), AppError> {
    let profile = state
        .store
        .get_profile(&user, req.profile_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let job_ad = state
        .store
        .get_job_ad(&user, req.job_ad_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job ad not found".to_string()))?;

    let (content, metadata) = state
        .normalizer
        .generate_tailored_resume(&profile.data, &job_ad, req.format)
        .await?;

    let resume = GeneratedResume {
        id: Uuid::new_v4(),
        user_id: user.to_string(),
        profile_id: profile.id,
        job_ad_id: job_ad.id,
        format: req.format,
        content,
        metadata,
    };
    state.store.insert_resume(&resume).await?;
    info!(
        "Generated resume {} from profile {} for job ad {}",
        resume.id, profile.id, job_ad.id
    );
    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<GeneratedResume>>, AppError> {
    Ok(Json(state.store.list_resumes(&user).await?))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<Json<GeneratedResume>, AppError> {
    let resume = state.store.get_resume(&user, id).await?.ok_or_else(not_found)?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_resume(&user, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

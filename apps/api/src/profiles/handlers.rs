use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::profile_from_parsed;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::upload::read_upload_text;
use crate::models::profile::{next_profile_name, Profile, ProfileData, ProfilePatch};
use crate::routes::params::{ApiJson, RecordId};
use crate::state::AppState;

fn not_found() -> AppError {
    AppError::NotFound("Profile not found".to_string())
}

/// GET /api/v1/profiles
/// A user with no profiles gets an empty "Profile 1" on first listing.
pub async fn handle_list_profiles(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Profile>>, AppError> {
    let profiles = state.store.list_profiles(&user).await?;
    if !profiles.is_empty() {
        return Ok(Json(profiles));
    }

    state.store.ensure_default_profile(&user).await?;
    Ok(Json(state.store.list_profiles(&user).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProfileRequest {
    pub name: Option<String>,
}

/// POST /api/v1/profiles
pub async fn handle_create_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Option<ApiJson<CreateProfileRequest>>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let requested = body
        .and_then(|ApiJson(req)| req.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let name = match requested {
        Some(name) => name,
        None => {
            let count = state.store.count_profiles(&user).await?;
            next_profile_name(usize::try_from(count).unwrap_or_default())
        }
    };

    let profile = state
        .store
        .create_profile(&user, &name, &ProfileData::default())
        .await?;
    info!("Created profile '{}' for user {user}", profile.name);
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<Json<Profile>, AppError> {
    let profile = state.store.get_profile(&user, id).await?.ok_or_else(not_found)?;
    Ok(Json(profile))
}

/// PATCH /api/v1/profiles/:id
/// Top-level keys under `data` replace the stored values; others are untouched.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<Json<Profile>, AppError> {
    let name = match patch.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("Profile name cannot be empty".into())),
        other => other,
    };
    if let Some(data) = &patch.data {
        ProfileData::default()
            .merged(data)
            .map_err(AppError::Validation)?;
    }

    let profile = state
        .store
        .update_profile(&user, id, name, patch.data.as_ref())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(profile))
}

/// DELETE /api/v1/profiles/:id
pub async fn handle_delete_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_profile(&user, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/profiles/:id/import
/// Replaces the profile's data with what the model reads out of an uploaded resume.
pub async fn handle_import_resume(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Profile>, AppError> {
    let mut multipart = multipart?;
    state.store.get_profile(&user, id).await?.ok_or_else(not_found)?;

    let text = read_upload_text(&mut multipart, state.config.max_upload_bytes).await?;
    let parsed = state.normalizer.parse_resume_text(&text).await?;
    let data = profile_from_parsed(&parsed.value);

    let replacement = match serde_json::to_value(&data) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(anyhow::anyhow!("profile data is not an object").into()),
        Err(e) => return Err(AppError::Internal(e.into())),
    };
    let profile = state
        .store
        .update_profile(&user, id, None, Some(&replacement))
        .await?
        .ok_or_else(not_found)?;

    info!("Imported resume into profile {id} with {}", parsed.model);
    Ok(Json(profile))
}

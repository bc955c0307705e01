use std::collections::HashSet;
use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, LinkAuthUser};
use crate::errors::AppError;
use crate::extract::upload::read_upload;
use crate::models::file::UploadedFile;
use crate::routes::params::{ApiJson, RecordId};
use crate::state::AppState;
use crate::store::upload_key;

/// How long a dropped `EventSource` waits before reconnecting.
const RECONNECT_AFTER: Duration = Duration::from_millis(5000);

const OCTET_STREAM: &str = "application/octet-stream";

fn not_found() -> AppError {
    AppError::NotFound("File not found".to_string())
}

/// POST /api/v1/files
/// Stores the bytes, then the metadata, ranked after the user's existing files.
pub async fn handle_upload_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadedFile>), AppError> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart, state.config.max_upload_bytes).await?;

    let id = Uuid::new_v4();
    let content_type = if upload.content_type.is_empty() {
        OCTET_STREAM.to_string()
    } else {
        upload.content_type
    };
    let mut file = UploadedFile {
        id,
        user_id: user.to_string(),
        filename: upload.filename,
        content_type,
        size: upload.bytes.len() as i64,
        content_key: upload_key(&user, id),
        upload_date: Utc::now(),
        order: 0,
    };

    state
        .blobs
        .put(&file.content_key, upload.bytes, &file.content_type)
        .await?;
    match state.store.insert_file(&file).await {
        Ok(order) => file.order = order,
        Err(e) => {
            if let Err(cleanup) = state.blobs.delete(&file.content_key).await {
                warn!("Orphaned blob {} after failed insert: {cleanup}", file.content_key);
            }
            return Err(e.into());
        }
    }

    if let Err(e) = state.feed.publish(&user, &file).await {
        warn!("Upload {} stored but not announced: {e}", file.id);
    }
    info!("Stored upload {} ({} bytes) for user {user}", file.id, file.size);
    Ok((StatusCode::CREATED, Json(file)))
}

/// GET /api/v1/files
pub async fn handle_list_files(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<UploadedFile>>, AppError> {
    Ok(Json(state.store.list_files(&user).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub updated: u64,
}

/// PUT /api/v1/files/order
/// Each id's rank becomes its index in `ids`. Ids the caller does not own are skipped.
pub async fn handle_reorder_files(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ReorderRequest>,
) -> Result<Json<ReorderResponse>, AppError> {
    let mut seen = HashSet::with_capacity(req.ids.len());
    if let Some(dup) = req.ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::Validation(format!("File {dup} appears more than once")));
    }

    let updated = state.store.reorder_files(&user, &req.ids).await?;
    Ok(Json(ReorderResponse { updated }))
}

/// GET /api/v1/files/:id/download
/// Accepts `?token=` so plain links work.
pub async fn handle_download_file(
    State(state): State<AppState>,
    LinkAuthUser(user): LinkAuthUser,
    RecordId(id): RecordId,
) -> Result<Response, AppError> {
    let file = state.store.get_file(&user, id).await?.ok_or_else(not_found)?;
    let bytes = state.blobs.get(&file.content_key).await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
    let disposition = HeaderValue::from_str(&file.content_disposition())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}

/// DELETE /api/v1/files/:id
pub async fn handle_delete_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    RecordId(id): RecordId,
) -> Result<StatusCode, AppError> {
    let file = state.store.delete_file(&user, id).await?.ok_or_else(not_found)?;
    if let Err(e) = state.blobs.delete(&file.content_key).await {
        warn!("Metadata for {id} removed but blob delete failed: {e}");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/files/stream
/// Server-sent events: one `snapshot` with the full listing, then an
/// `inserted` event per new upload. Subscribes before reading the snapshot,
/// so a file can appear in both; clients dedupe by id.
pub async fn handle_file_stream(
    State(state): State<AppState>,
    LinkAuthUser(user): LinkAuthUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let updates = state.feed.subscribe(&user).await?;
    let snapshot = state.store.list_files(&user).await?;

    let first = Event::default()
        .event("snapshot")
        .retry(RECONNECT_AFTER)
        .json_data(&snapshot)
        .map_err(|e| AppError::Internal(e.into()))?;

    let inserted = updates.filter_map(|file| async move {
        Event::default()
            .event("inserted")
            .id(file.id.to_string())
            .json_data(&file)
            .ok()
    });

    let events = stream::once(async move { first })
        .chain(inserted)
        .map(Ok::<_, Infallible>);

    info!("User {user} subscribed to upload events");
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

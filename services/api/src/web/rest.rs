//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the photo journal endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use progress_journal_core::{
    decode_upload, JournalError, JournalStats, MediaAsset, MediaCategory, PeriodBucket, RawFile, UnknownCategory,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_asset_handler,
        list_assets_handler,
        list_periods_handler,
        stats_handler,
        save_handler,
        clear_handler,
        health_handler,
    ),
    components(
        schemas(AssetResponse, UploadResponse, PeriodResponse, StatsResponse)
    ),
    tags(
        (name = "Progress Journal API", description = "Dated front/side/back progress photos grouped by month.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One stored progress photo.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct AssetResponse {
    pub id: Uuid,
    /// One of `front`, `side`, `back`.
    pub category: String,
    /// Self-contained `data:` URI.
    pub payload: String,
    /// RFC 3339 capture time in the capturing device's offset.
    pub captured_at: String,
    /// "Month Year" grouping label.
    pub period_key: String,
}

impl From<&MediaAsset> for AssetResponse {
    fn from(asset: &MediaAsset) -> Self {
        Self {
            id: asset.id,
            category: asset.category.to_string(),
            payload: asset.payload.clone(),
            captured_at: asset.captured_at.to_rfc3339(),
            period_key: asset.period_key.clone(),
        }
    }
}

/// The response sent after an upload. `persisted` is false when the photo is
/// only held in memory because the store write failed.
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub asset: AssetResponse,
    pub persisted: bool,
    pub warning: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PeriodResponse {
    pub period_key: String,
    pub front: Option<AssetResponse>,
    pub side: Option<AssetResponse>,
    pub back: Option<AssetResponse>,
}

impl From<&PeriodBucket> for PeriodResponse {
    fn from(bucket: &PeriodBucket) -> Self {
        Self {
            period_key: bucket.period_key.clone(),
            front: bucket.front.as_ref().map(AssetResponse::from),
            side: bucket.side.as_ref().map(AssetResponse::from),
            back: bucket.back.as_ref().map(AssetResponse::from),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_assets: usize,
    pub periods_tracked: usize,
    pub days_since_first: i64,
    pub current_period_count: usize,
}

impl From<JournalStats> for StatsResponse {
    fn from(stats: JournalStats) -> Self {
        Self {
            total_assets: stats.total_assets,
            periods_tracked: stats.periods_tracked,
            days_since_first: stats.days_since_first,
            current_period_count: stats.current_period_count,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a progress photo.
///
/// Accepts a multipart/form-data request with a `category` text part
/// (`front`, `side` or `back`) and a `file` part holding the image.
#[utoipa::path(
    post,
    path = "/journal/assets",
    request_body(content_type = "multipart/form-data", description = "The category and the photo to upload."),
    responses(
        (status = 201, description = "Photo added (check `persisted`)", body = UploadResponse),
        (status = 400, description = "Missing part or unknown category"),
        (status = 422, description = "The file could not be read as an image"),
        (status = 503, description = "Server is shutting down"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_asset_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), (StatusCode, String)> {
    let mut category: Option<String> = None;
    let mut file: Option<RawFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "category" => {
                let text = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read category: {}", e),
                    )
                })?;
                category = Some(text);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some(RawFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let category = category.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a category".to_string(),
        )
    })?;
    let category: MediaCategory = category
        .parse()
        .map_err(|e: UnknownCategory| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let file = file.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        )
    })?;

    // Decode without holding the journal lock so queries are never stuck behind an upload.
    let reader = app_state.journal.lock().await.reader();
    let result = match decode_upload(reader.as_ref(), file, Some(&app_state.shutdown)).await {
        Ok(payload) => {
            let mut journal = app_state.journal.lock().await;
            journal.record_decoded(category, payload).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(asset) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                asset: AssetResponse::from(&asset),
                persisted: true,
                warning: None,
            }),
        )),
        Err(JournalError::Persistence { asset: Some(asset), source }) => {
            warn!(id = %asset.id, "Photo kept in memory only: {}", source);
            let warning = JournalError::Persistence { asset: None, source }
                .user_message()
                .to_string();
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    asset: AssetResponse::from(asset.as_ref()),
                    persisted: false,
                    warning: Some(warning),
                }),
            ))
        }
        Err(err) => Err(journal_error_response(err)),
    }
}

/// List every stored photo in upload order, including shadowed ones.
#[utoipa::path(
    get,
    path = "/journal/assets",
    responses((status = 200, description = "All photos in upload order", body = Vec<AssetResponse>))
)]
pub async fn list_assets_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<AssetResponse>> {
    let journal = app_state.journal.lock().await;
    Json(journal.assets().iter().map(AssetResponse::from).collect())
}

/// The most recent months, oldest first, with one photo per category.
#[utoipa::path(
    get,
    path = "/journal/periods",
    responses((status = 200, description = "Grouped view", body = Vec<PeriodResponse>))
)]
pub async fn list_periods_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<PeriodResponse>> {
    let journal = app_state.journal.lock().await;
    Json(journal.group_by_period().iter().map(PeriodResponse::from).collect())
}

#[utoipa::path(
    get,
    path = "/journal/stats",
    responses((status = 200, description = "Summary statistics", body = StatsResponse))
)]
pub async fn stats_handler(State(app_state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let journal = app_state.journal.lock().await;
    Json(journal.stats().into())
}

/// Write the in-memory journal to the store again, e.g. after a failed upload save.
#[utoipa::path(
    post,
    path = "/journal/save",
    responses(
        (status = 204, description = "Journal persisted"),
        (status = 503, description = "The store rejected the write")
    )
)]
pub async fn save_handler(State(app_state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    let journal = app_state.journal.lock().await;
    journal.save().await.map_err(journal_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every photo.
#[utoipa::path(
    delete,
    path = "/journal",
    responses(
        (status = 204, description = "Journal cleared"),
        (status = 503, description = "The store rejected the removal")
    )
)]
pub async fn clear_handler(State(app_state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    let mut journal = app_state.journal.lock().await;
    journal.clear().await.map_err(journal_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Maps a journal failure to a status code and the user-facing message.
fn journal_error_response(err: JournalError) -> (StatusCode, String) {
    let status = match &err {
        JournalError::InvalidCategory(_) => StatusCode::BAD_REQUEST,
        JournalError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JournalError::Persistence { .. } | JournalError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        JournalError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Journal operation failed: {}", err);
    } else {
        warn!("Journal request rejected: {}", err);
    }
    (status, err.user_message().to_string())
}

pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::log_requests;
pub use rest::{
    clear_handler, health_handler, list_assets_handler, list_periods_handler, save_handler, stats_handler,
    upload_asset_handler,
};

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Multipart framing and the category part ride on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the journal API router over the shared state.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let body_limit = app_state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let journal_routes = Router::new()
        .route("/journal", delete(clear_handler))
        .route("/journal/assets", post(upload_asset_handler).get(list_assets_handler))
        .route("/journal/periods", get(list_periods_handler))
        .route("/journal/stats", get(stats_handler))
        .route("/journal/save", post(save_handler));

    Ok(Router::new()
        .merge(journal_routes)
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(axum_middleware::from_fn(log_requests))
        .with_state(app_state))
}

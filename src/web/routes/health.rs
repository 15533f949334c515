//! Health Routes
//!
//! - GET /api/health - Image API check, advertises a sample image URL
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (SPA build present)

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::web::error::{WebError, WebResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiHealth {
    pub status: String,
    pub images: String,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

/// GET /api/health
pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "OK".to_string(),
        images: state.config.image_url(&state.config.sample_image),
    })
}

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// 503 until the SPA entry point exists on disk.
pub async fn readiness(State(state): State<Arc<AppState>>) -> WebResult<Json<ReadyResponse>> {
    if !state.has_index() {
        return Err(WebError::ServiceUnavailable(format!(
            "{} not found",
            state.config.index_path().display()
        )));
    }

    Ok(Json(ReadyResponse {
        status: "ready".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

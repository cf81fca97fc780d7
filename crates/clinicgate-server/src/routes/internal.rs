//! Internal routes for health checks and rate limit administration.

use crate::{
    error::ApiError,
    middleware::rate_limit::{KeySnapshot, KeyStatus},
    response::ApiResponse,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

/// Create the internal routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/rate-limits", get(list_keys))
        .route("/rate-limits/sweep", post(sweep))
        .route("/rate-limits/:key", get(key_status).delete(reset_key))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn readiness(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if state.shutdown.is_shutting_down() {
        return Err(ApiError::ServiceUnavailable);
    }

    Ok(Json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "checks": {
            "rate_limit_keys": state.rate_limits.store().len()
        }
    })))
}

async fn list_keys(State(state): State<AppState>) -> ApiResponse<Vec<KeySnapshot>> {
    ApiResponse::success(state.rate_limits.all_keys())
}

async fn key_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResponse<KeyStatus> {
    ApiResponse::success(state.rate_limits.status(&key))
}

#[derive(Debug, Serialize)]
struct ResetOutcome {
    key: String,
    existed: bool,
}

async fn reset_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResponse<ResetOutcome> {
    let existed = state.rate_limits.reset(&key);
    ApiResponse::success(ResetOutcome { key, existed })
}

#[derive(Debug, Serialize)]
struct SweepOutcome {
    removed: usize,
}

async fn sweep(State(state): State<AppState>) -> ApiResponse<SweepOutcome> {
    ApiResponse::success(SweepOutcome {
        removed: state.rate_limits.sweep_expired(),
    })
}

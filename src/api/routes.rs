//! Status API handlers

use super::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /status - Current status snapshot
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.status.read().await.clone();
    Json(snapshot)
}

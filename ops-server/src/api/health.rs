//! Health endpoint

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use shared::{AppError, AppResult};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

/// GET /health — 503 while the state store is unreachable
async fn health(State(state): State<ServerState>) -> AppResult<Json<serde_json::Value>> {
    if !state.store_healthy().await {
        return Err(AppError::service_unavailable("state store unavailable"));
    }
    Ok(Json(json!({ "status": "ok" })))
}

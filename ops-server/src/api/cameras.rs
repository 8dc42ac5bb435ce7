//! Camera registry endpoints
//!
//! Registering or installing crop JSON nudges the supervisor so workers
//! resync at their next safe point.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{Camera, CropJson};
use shared::{AppError, AppResult};

use crate::core::ServerState;
use crate::db::repository::camera;
use crate::utils::validation::{validate_required_text, MAX_NAME_LEN};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/cameras", post(register))
        .route("/cameras/{camera_id}/crop-json", put(install_crop_json))
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    camera_id: String,
    restaurant_id: String,
    video_source: String,
    #[serde(default)]
    crop_json: Option<CropJson>,
    #[serde(default)]
    table_map: Option<HashMap<String, String>>,
}

/// POST /cameras — register or update the video source (+ optional crop JSON)
async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<Json<Camera>> {
    validate_required_text(&payload.camera_id, "camera_id", MAX_NAME_LEN)?;
    validate_required_text(&payload.video_source, "video_source", 500)?;

    let mut cam = camera::register(
        &state.pool,
        &payload.camera_id,
        &payload.restaurant_id,
        &payload.video_source,
    )
    .await
    .map_err(AppError::from)?;

    if let Some(crop_json) = &payload.crop_json {
        let table_map = payload.table_map.clone().unwrap_or_default();
        cam = camera::install_crop_json(&state.pool, &payload.camera_id, crop_json, &table_map)
            .await
            .map_err(AppError::from)?;
    }

    state.notify_camera_registry();
    Ok(Json(cam))
}

#[derive(Debug, Deserialize)]
struct InstallPayload {
    crop_json: CropJson,
    /// json-table-id → physical table id
    #[serde(default)]
    table_map: HashMap<String, String>,
}

/// PUT /cameras/{camera_id}/crop-json — install metadata + mapping
async fn install_crop_json(
    State(state): State<ServerState>,
    Path(camera_id): Path<String>,
    Json(payload): Json<InstallPayload>,
) -> AppResult<Json<Camera>> {
    let cam = camera::install_crop_json(&state.pool, &camera_id, &payload.crop_json, &payload.table_map)
        .await
        .map_err(AppError::from)?;
    state.notify_camera_registry();
    Ok(Json(cam))
}

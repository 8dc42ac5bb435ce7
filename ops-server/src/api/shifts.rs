//! Shift lifecycle endpoints

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{Shift, ShiftStatus};
use shared::{AppError, AppResult, ErrorCode};

use crate::core::ServerState;
use crate::db::repository::{shift, RepoError};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/shifts/clock-in", post(clock_in))
        .route("/shifts/{shift_id}/clock-out", post(clock_out))
        .route("/shifts/{shift_id}/break", post(set_break))
}

#[derive(Debug, Deserialize)]
struct ClockInPayload {
    restaurant_id: String,
    waiter_id: String,
    #[serde(default)]
    section_id: Option<String>,
}

/// POST /shifts/clock-in — one open shift per waiter
async fn clock_in(
    State(state): State<ServerState>,
    Json(payload): Json<ClockInPayload>,
) -> AppResult<Json<Shift>> {
    let result = shift::clock_in(
        &state.pool,
        &payload.restaurant_id,
        &payload.waiter_id,
        payload.section_id.as_deref(),
    )
    .await;

    match result {
        Ok(shift) => Ok(Json(shift)),
        Err(RepoError::Duplicate(msg)) => {
            Err(AppError::with_message(ErrorCode::ShiftAlreadyOpen, msg))
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// POST /shifts/{shift_id}/clock-out
async fn clock_out(
    State(state): State<ServerState>,
    Path(shift_id): Path<String>,
) -> AppResult<Json<Shift>> {
    let ended = shift::clock_out(&state.pool, &shift_id).await.map_err(AppError::from)?;
    Ok(Json(ended))
}

#[derive(Debug, Deserialize)]
struct BreakPayload {
    on_break: bool,
}

/// POST /shifts/{shift_id}/break — toggle break status
async fn set_break(
    State(state): State<ServerState>,
    Path(shift_id): Path<String>,
    Json(payload): Json<BreakPayload>,
) -> AppResult<Json<Shift>> {
    let status = if payload.on_break { ShiftStatus::OnBreak } else { ShiftStatus::Active };
    let updated = shift::set_status(&state.pool, &shift_id, status)
        .await
        .map_err(AppError::from)?;
    Ok(Json(updated))
}

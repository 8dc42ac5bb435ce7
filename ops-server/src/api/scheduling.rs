//! Scheduling endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::Schedule;
use shared::{AppError, AppResult};

use crate::core::ServerState;
use crate::db::repository::schedule;
use crate::scheduling::engine::{EngineResult, SchedulingEngine};
use crate::scheduling::narrator::DisabledNarrator;
use crate::utils::time::parse_date;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/scheduling/run", post(run_engine))
        .route("/scheduling/publish", post(publish))
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    restaurant_id: String,
    /// Any date inside the target week (YYYY-MM-DD)
    week_start: String,
}

/// POST /scheduling/run — synchronous; the run lock rejects overlap
async fn run_engine(
    State(state): State<ServerState>,
    Json(payload): Json<RunPayload>,
) -> AppResult<Json<EngineResult>> {
    let week = parse_date(&payload.week_start)?;
    let engine = SchedulingEngine::new(state.pool.clone(), Arc::new(DisabledNarrator));
    let result = engine.run(&state.run_locks, &payload.restaurant_id, week).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct PublishPayload {
    schedule_id: String,
}

/// POST /scheduling/publish — archives the prior published week
async fn publish(
    State(state): State<ServerState>,
    Json(payload): Json<PublishPayload>,
) -> AppResult<Json<Schedule>> {
    let published = schedule::publish(&state.pool, &payload.schedule_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(published))
}

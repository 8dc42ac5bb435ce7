//! Routing and waitlist endpoints

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{
    LocationPreference, RoutingMode, TablePreference, Visit, WaitlistEntry,
};
use shared::util::now_millis;
use shared::{AppError, AppResult};

use crate::core::ServerState;
use crate::db::repository::waitlist;
use crate::routing::service::{RouteRequest, RouteResponse, RouterService};
use crate::utils::validation::{validate_party_size, validate_required_text, MAX_NAME_LEN};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/routing/recommend", post(recommend))
        .route("/routing/seat", post(seat))
        .route("/routing/mode", post(switch_mode))
        .route("/waitlist", post(enqueue))
}

#[derive(Debug, Deserialize)]
struct RecommendPayload {
    restaurant_id: String,
    #[serde(flatten)]
    request: RouteRequest,
}

/// POST /routing/recommend
async fn recommend(
    State(state): State<ServerState>,
    Json(payload): Json<RecommendPayload>,
) -> AppResult<Json<RouteResponse>> {
    if let Some(size) = payload.request.party_size {
        validate_party_size(size)?;
    }
    let service = RouterService::new(state.pool.clone());
    let response = service.recommend(&payload.restaurant_id, &payload.request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct SeatPayload {
    restaurant_id: String,
    table_id: String,
    waiter_id: String,
    party_size: i64,
    #[serde(default)]
    waitlist_id: Option<String>,
}

/// POST /routing/seat
async fn seat(
    State(state): State<ServerState>,
    Json(payload): Json<SeatPayload>,
) -> AppResult<Json<Visit>> {
    validate_party_size(payload.party_size)?;
    let service = RouterService::new(state.pool.clone());
    let visit = service
        .seat(
            &payload.restaurant_id,
            &payload.table_id,
            &payload.waiter_id,
            payload.party_size,
            payload.waitlist_id.as_deref(),
        )
        .await?;
    Ok(Json(visit))
}

#[derive(Debug, Deserialize)]
struct SwitchModePayload {
    restaurant_id: String,
    mode: RoutingMode,
}

/// POST /routing/mode
async fn switch_mode(
    State(state): State<ServerState>,
    Json(payload): Json<SwitchModePayload>,
) -> AppResult<Json<serde_json::Value>> {
    let updated = crate::db::repository::restaurant::switch_routing_mode(
        &state.pool,
        &payload.restaurant_id,
        payload.mode,
    )
    .await
    .map_err(AppError::from)?;
    Ok(Json(serde_json::json!({
        "restaurant_id": updated.id,
        "mode": payload.mode,
    })))
}

#[derive(Debug, Deserialize)]
struct EnqueuePayload {
    restaurant_id: String,
    #[serde(default)]
    party_name: Option<String>,
    party_size: i64,
    #[serde(default)]
    table_preference: TablePreference,
    #[serde(default)]
    location_preference: LocationPreference,
}

/// POST /waitlist — quotes a wait from the trailing two hours of seatings
async fn enqueue(
    State(state): State<ServerState>,
    Json(payload): Json<EnqueuePayload>,
) -> AppResult<Json<WaitlistEntry>> {
    validate_party_size(payload.party_size)?;
    if let Some(name) = &payload.party_name {
        validate_required_text(name, "party_name", MAX_NAME_LEN)?;
    }

    let two_hours_ago = now_millis() - 2 * 3600 * 1000;
    let quote = waitlist::average_wait_minutes(&state.pool, &payload.restaurant_id, two_hours_ago)
        .await
        .map_err(AppError::from)?
        .map(|minutes| minutes.round() as i64);

    let entry = waitlist::create(
        &state.pool,
        &payload.restaurant_id,
        payload.party_name.as_deref(),
        payload.party_size,
        payload.table_preference,
        payload.location_preference,
        quote,
    )
    .await
    .map_err(AppError::from)?;
    Ok(Json(entry))
}

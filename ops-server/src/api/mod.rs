//! Thin HTTP façade
//!
//! Handlers validate, serialize to one core call, and map repository or
//! module errors onto the unified [`shared::AppError`] response shape.
//! All real behavior lives in the core modules.

use axum::Router;
use http::HeaderValue;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod cameras;
pub mod health;
pub mod ml;
pub mod routing;
pub mod scheduling;
pub mod shifts;

/// Request-id generator for trace correlation
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// All routes, no middleware or state
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(ml::router())
        .merge(routing::router())
        .merge(scheduling::router())
        .merge(cameras::router())
        .merge(shifts::router())
}

/// Fully configured application
pub fn build_app(state: ServerState) -> Router {
    let x_request_id = http::HeaderName::from_static("x-request-id");
    build_router()
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, XRequestId))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

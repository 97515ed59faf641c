//! HTTP API

pub mod health;
pub mod onboarding;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::AppState;

/// Build the full router with middleware
pub fn build_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .merge(health::router())
        .merge(onboarding::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

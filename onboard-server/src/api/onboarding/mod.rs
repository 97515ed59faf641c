//! Onboarding API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/onboarding | POST | Submit an application |
//! | /api/onboarding?state= | GET | List by status (default `pending`) |
//! | /api/onboarding/{request_id} | GET | One request, in flight or active |
//! | /api/onboarding/approve | POST | Run the approval saga |
//! | /api/onboarding/{request_id}/retry | POST | Revert to `pending` |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/onboarding", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::submit).get(handler::list))
        .route("/approve", post(handler::approve))
        .route("/{request_id}", get(handler::get_by_id))
        .route("/{request_id}/retry", post(handler::retry))
}

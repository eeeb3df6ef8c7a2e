//! Route definitions for the `/presence` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Routes mounted at `/presence`. All require authentication.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(presence::start).get(presence::history))
        .route("/sessions/heartbeat", post(presence::heartbeat))
        .route("/sessions/active", get(presence::active))
        .route("/sessions/{id}", get(presence::get))
        .route("/sessions/{id}/end", post(presence::end))
}

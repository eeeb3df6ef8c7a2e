//! Route definitions for the `/points` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::points;
use crate::state::AppState;

/// Routes mounted at `/points`. All require authentication.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(points::balance))
        .route("/history", get(points::history))
}

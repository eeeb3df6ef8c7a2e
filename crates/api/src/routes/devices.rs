//! Route definitions for the `/devices` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Routes mounted at `/devices`. All require authentication.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(devices::list))
        .route("/active", get(devices::list_active))
        .route("/logout-all", post(devices::logout_all))
        .route("/{device_id}", delete(devices::remove))
        .route("/{device_id}/logout", post(devices::logout))
}

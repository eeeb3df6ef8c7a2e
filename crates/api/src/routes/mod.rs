pub mod auth;
pub mod devices;
pub mod health;
pub mod points;
pub mod presence;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                          register (public)
/// /auth/login                             login (public)
/// /auth/login-device                      device-aware login (public)
/// /auth/verify-device                     device step-up (public)
/// /auth/refresh                           refresh (public)
/// /auth/forgot-password                   request reset token (public)
/// /auth/reset-password                    consume reset token (public)
/// /auth/logout                            logout (requires auth)
/// /auth/profile                           profile (requires auth)
///
/// /devices                                list devices
/// /devices/active                         list active devices
/// /devices/logout-all                     logout everywhere (POST)
/// /devices/{device_id}                    remove device (DELETE)
/// /devices/{device_id}/logout             logout device (POST)
///
/// /presence/sessions                      start (POST), history (GET)
/// /presence/sessions/heartbeat            heartbeat (POST)
/// /presence/sessions/active               active session (GET)
/// /presence/sessions/{id}                 session detail (GET)
/// /presence/sessions/{id}/end             end session (POST)
///
/// /points/balance                         balance (GET)
/// /points/history                         ledger history (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/devices", devices::router())
        .nest("/presence", presence::router())
        .nest("/points", points::router())
}

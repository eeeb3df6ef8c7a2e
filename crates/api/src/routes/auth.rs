//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register         -> register
/// POST /login            -> login
/// POST /login-device     -> login_device
/// POST /verify-device    -> verify_device
/// POST /refresh          -> refresh
/// POST /forgot-password  -> forgot_password
/// POST /reset-password   -> reset_password
/// POST /logout           -> logout (requires auth)
/// GET  /profile          -> profile (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/login-device", post(auth::login_device))
        .route("/verify-device", post(auth::verify_device))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile))
}

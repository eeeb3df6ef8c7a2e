//! Authentication middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer
//!   token and checks the server-side token record is still live.

pub mod auth;

//! HTTP handlers, grouped by resource.

pub mod auth;
pub mod devices;
pub mod points;
pub mod presence;

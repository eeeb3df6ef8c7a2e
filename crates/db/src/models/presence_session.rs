//! Presence session model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Lifecycle states for a presence session, stored as TEXT.
///
/// Transitions: `active -> completed` (client end or timeout sweep) and
/// `active -> cancelled` (reserved, not currently reachable). Terminal states
/// never transition again.
pub mod status {
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";
}

/// A presence session row from the `presence_sessions` table.
///
/// Rows are never deleted; completed sessions are retained as history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PresenceSession {
    pub id: DbId,
    pub user_id: DbId,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub duration_minutes: i64,
    pub points_earned: i64,
    pub status: String,
    pub last_heartbeat: Option<Timestamp>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new presence session.
pub struct CreatePresenceSession {
    pub user_id: DbId,
    pub start_time: Timestamp,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
}

//! Points ledger entry model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Ledger transaction types, stored as TEXT.
pub mod transaction_type {
    /// Credit for a completed presence session.
    pub const PRESENCE: &str = "presence";
    pub const REFERRAL: &str = "referral";
    pub const ADMIN: &str = "admin";
    /// Debit for spending points (negative amount).
    pub const REDEMPTION: &str = "redemption";
}

/// An append-only row from the `points` ledger.
///
/// `balance_after` is the account balance immediately after this entry; the
/// newest entry's snapshot is the authoritative available-points value.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PointEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub amount: i64,
    pub transaction_type: String,
    pub reference_id: Option<DbId>,
    pub description: Option<String>,
    pub balance_after: i64,
    pub created_at: Timestamp,
}

/// DTO for appending a ledger entry.
pub struct CreatePointEntry {
    pub user_id: DbId,
    pub amount: i64,
    pub transaction_type: &'static str,
    pub reference_id: Option<DbId>,
    pub description: Option<String>,
}

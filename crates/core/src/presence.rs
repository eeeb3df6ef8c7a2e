//! Duration and point arithmetic for presence sessions.
//!
//! Points accrue at 1 point per whole elapsed minute, with no cap. Partial
//! minutes never round up; a session shorter than one minute earns nothing.

use crate::types::Timestamp;

/// Whole minutes elapsed between `start` and `end`, floored.
///
/// Returns 0 when `end` precedes `start` (clock skew must never produce a
/// negative duration or a negative ledger entry).
pub fn elapsed_minutes(start: Timestamp, end: Timestamp) -> i64 {
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        return 0;
    }
    secs / 60
}

/// Points earned for a session of `minutes` whole minutes: 1 point per minute.
pub fn points_for_minutes(minutes: i64) -> i64 {
    minutes.max(0)
}

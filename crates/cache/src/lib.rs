//! Ephemeral TTL-bearing key-value store.
//!
//! Tokens, OTP challenges, cached account snapshots, and active-session
//! markers all live here, distinct from the durable relational store. Values
//! are JSON strings; callers (de)serialize with `serde_json`. Every entry
//! carries a TTL and self-expires, so no cleanup job is needed.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use canopy_core::error::CoreError;

/// Async key-value operations against the ephemeral store.
///
/// The interface is deliberately narrow: plain get/set-with-TTL plus the two
/// atomic primitives correctness depends on: `set_nx` (the active-session
/// marker guard) and `incr` (the OTP attempt counter). Implementations must
/// make each operation atomic with respect to concurrent callers of the same
/// key.
#[async_trait::async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Fetch the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// Store `value` at `key` with the given time-to-live.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CoreError>;

    /// Store `value` at `key` only if the key is absent (or expired).
    ///
    /// Returns `true` if the value was written. This is the guard used to
    /// serialize concurrent presence-session starts per account.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CoreError>;

    /// Delete `key`. Deleting an absent key is a no-op.
    async fn del(&self, key: &str) -> Result<(), CoreError>;

    /// Whether a live (non-expired) entry exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, CoreError>;

    /// Remaining time-to-live for `key`, or `None` if absent or expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CoreError>;

    /// Atomically increment the integer at `key`, creating it at 1 if absent.
    ///
    /// Returns the value after the increment. A pre-existing entry keeps its
    /// TTL; a freshly created counter has no expiry until `expire` is called.
    async fn incr(&self, key: &str) -> Result<i64, CoreError>;

    /// Reset the TTL of an existing entry. No-op if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CoreError>;
}

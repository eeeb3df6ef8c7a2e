//! In-process implementation of [`EphemeralStore`].
//!
//! A single mutex-guarded map with per-entry deadlines. Expiry is lazy: an
//! entry past its deadline is treated as absent (and dropped) on the next
//! access. Holding the store lock for the whole operation is what makes
//! `incr` and `set_nx` atomic with respect to concurrent callers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use canopy_core::error::CoreError;
use tokio::sync::Mutex;

use crate::EphemeralStore;

struct Entry {
    value: String,
    /// `None` means the entry never expires (counters before `expire`).
    deadline: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if d <= now)
    }
}

/// Mutex-guarded in-memory TTL store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EphemeralStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), CoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(entry.deadline.map(|d| d - now)),
            None => Ok(None),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let (current, deadline) = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let parsed: i64 = entry.value.parse().map_err(|_| {
                    CoreError::Internal(format!("non-integer value at key {key}"))
                })?;
                (parsed, entry.deadline)
            }
            _ => (0, None),
        };

        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                deadline,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired(now) {
                entries.remove(key);
            } else {
                entry.deadline = Some(now + ttl);
            }
        }
        Ok(())
    }
}

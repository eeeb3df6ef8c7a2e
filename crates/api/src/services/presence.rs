//! Presence session lifecycle: start, heartbeat, end, and the timeout sweep.
//!
//! A user holds at most one active session. The guard is an ephemeral marker
//! key claimed with `set_nx` before the row is inserted, so two concurrent
//! starts race on the store's atomic claim rather than on a read-then-write.
//! Closing, whether by the client or by the sweep, runs one transactional
//! path: the `status = 'active'` guard on the UPDATE decides the winner of
//! an end-vs-sweep race, and only the winner appends the ledger entry, so a
//! session is awarded points exactly once.

use std::sync::Arc;
use std::time::Duration;

use canopy_cache::EphemeralStore;
use canopy_core::error::CoreError;
use canopy_core::presence::{elapsed_minutes, points_for_minutes};
use canopy_core::types::{DbId, Timestamp};
use canopy_db::models::point::{transaction_type, CreatePointEntry};
use canopy_db::models::presence_session::{status, CreatePresenceSession, PresenceSession};
use canopy_db::repositories::{PointRepo, PresenceSessionRepo};
use canopy_db::DbPool;
use serde::Serialize;

use crate::error::db_err;

/// Active sessions with no heartbeat for this long are presumed abandoned.
pub const HEARTBEAT_TIMEOUT_MINUTES: i64 = 20;

/// Upper bound on the active-session marker. A session that somehow survives
/// past this is closed by the sweep long before the marker lapses.
const MARKER_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Heartbeat acknowledgement with a live preview of the session's worth.
#[derive(Debug, Serialize)]
pub struct HeartbeatAck {
    pub acknowledged: bool,
    pub session_id: DbId,
    pub session_status: String,
    /// Whole minutes elapsed so far.
    pub current_duration_minutes: i64,
    /// Points the session would earn if it ended now.
    pub points_earned: i64,
}

/// Terminal summary returned when a session closes.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: DbId,
    pub end_time: Timestamp,
    pub duration_minutes: i64,
    pub points_earned: i64,
}

/// Drives presence sessions from start to close.
pub struct PresenceLifecycle {
    pool: DbPool,
    store: Arc<dyn EphemeralStore>,
}

impl PresenceLifecycle {
    pub fn new(pool: DbPool, store: Arc<dyn EphemeralStore>) -> Self {
        Self { pool, store }
    }

    fn marker_key(user_id: DbId) -> String {
        format!("presence-active:{user_id}")
    }

    /// Start a session for the user.
    ///
    /// The marker claim is the concurrency gate: of N simultaneous starts,
    /// exactly one wins `set_nx`; the rest fail with `Conflict` without ever
    /// touching the database. If the row insert fails after a won claim, the
    /// marker is released so the user is not locked out.
    pub async fn start(
        &self,
        user_id: DbId,
        device_id: Option<String>,
        ip_address: Option<String>,
    ) -> Result<PresenceSession, CoreError> {
        let marker = Self::marker_key(user_id);
        let claimed = self.store.set_nx(&marker, "pending", MARKER_TTL).await?;
        if !claimed {
            return Err(CoreError::Conflict(
                "An active session already exists".to_string(),
            ));
        }

        let input = CreatePresenceSession {
            user_id,
            start_time: chrono::Utc::now(),
            device_id,
            ip_address,
        };
        let session = match PresenceSessionRepo::create(&self.pool, &input).await {
            Ok(session) => session,
            Err(e) => {
                // Roll the claim back; a dangling marker would block every
                // future start until it expires.
                let _ = self.store.del(&marker).await;
                return Err(db_err(e));
            }
        };

        self.store
            .set(&marker, &session.id.to_string(), MARKER_TTL)
            .await?;
        tracing::info!(user_id, session_id = session.id, "presence session started");
        Ok(session)
    }

    /// Record a heartbeat on one of the user's sessions.
    ///
    /// The session must exist under the caller's account (`NotFound`
    /// otherwise) and still be active (`InvalidState` otherwise). Returns an
    /// acknowledgement carrying the session's running duration and the points
    /// it would earn if it ended at this heartbeat.
    pub async fn heartbeat(
        &self,
        user_id: DbId,
        session_id: DbId,
    ) -> Result<HeartbeatAck, CoreError> {
        let session = self.owned_active_session(user_id, session_id).await?;

        let now = chrono::Utc::now();
        let refreshed = PresenceSessionRepo::touch_heartbeat(&self.pool, session.id, user_id, now)
            .await
            .map_err(db_err)?
            // The session closed between the lookup and the touch.
            .ok_or_else(|| CoreError::InvalidState("Session is not active".to_string()))?;

        let minutes = elapsed_minutes(refreshed.start_time, now);
        Ok(HeartbeatAck {
            acknowledged: true,
            session_id: refreshed.id,
            session_status: refreshed.status,
            current_duration_minutes: minutes,
            points_earned: points_for_minutes(minutes),
        })
    }

    /// End one of the user's sessions now.
    ///
    /// Same lookup contract as [`Self::heartbeat`]: an unknown id is
    /// `NotFound`, an already-closed session is `InvalidState`.
    pub async fn end(&self, user_id: DbId, session_id: DbId) -> Result<SessionSummary, CoreError> {
        let session = self.owned_active_session(user_id, session_id).await?;
        self.close(&session, chrono::Utc::now()).await
    }

    /// Fetch a session by id and owner, requiring it to still be active.
    async fn owned_active_session(
        &self,
        user_id: DbId,
        session_id: DbId,
    ) -> Result<PresenceSession, CoreError> {
        let session = PresenceSessionRepo::find_for_user(&self.pool, session_id, user_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound { entity: "Session" })?;
        if session.status != status::ACTIVE {
            return Err(CoreError::InvalidState("Session is not active".to_string()));
        }
        Ok(session)
    }

    /// The user's active session, if any.
    pub async fn active_session(
        &self,
        user_id: DbId,
    ) -> Result<Option<PresenceSession>, CoreError> {
        PresenceSessionRepo::find_active_for_user(&self.pool, user_id)
            .await
            .map_err(db_err)
    }

    /// Close every active session whose heartbeat went silent.
    ///
    /// Each timed-out session is credited up to its last heartbeat (or its
    /// start, if it never sent one) rather than up to the sweep's run time.
    /// Per-session failures are logged and skipped so one bad row cannot
    /// stall the sweep. Returns the number of sessions closed.
    pub async fn sweep_timed_out(&self) -> Result<u64, CoreError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::minutes(HEARTBEAT_TIMEOUT_MINUTES);
        let stale = PresenceSessionRepo::list_timed_out(&self.pool, cutoff)
            .await
            .map_err(db_err)?;

        let mut closed = 0u64;
        for session in stale {
            let end_time = session.last_heartbeat.unwrap_or(session.start_time);
            match self.close(&session, end_time).await {
                Ok(summary) => {
                    closed += 1;
                    tracing::info!(
                        session_id = session.id,
                        user_id = session.user_id,
                        duration_minutes = summary.duration_minutes,
                        points_earned = summary.points_earned,
                        "timed-out session closed"
                    );
                }
                // Lost the race to a concurrent client end; nothing to do.
                Err(CoreError::InvalidState(_)) => {}
                Err(e) => {
                    tracing::error!(session_id = session.id, error = %e, "sweep failed to close session");
                }
            }
        }
        Ok(closed)
    }

    /// Shared close path for client ends and the sweep.
    ///
    /// One transaction covers the status transition and the ledger append.
    /// `complete` returning `false` means another closer already won; the
    /// transaction is dropped without awarding anything.
    async fn close(
        &self,
        session: &PresenceSession,
        end_time: Timestamp,
    ) -> Result<SessionSummary, CoreError> {
        let duration_minutes = elapsed_minutes(session.start_time, end_time);
        let points_earned = points_for_minutes(duration_minutes);

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let transitioned = PresenceSessionRepo::complete(
            &mut tx,
            session.id,
            end_time,
            duration_minutes,
            points_earned,
        )
        .await
        .map_err(db_err)?;
        if !transitioned {
            return Err(CoreError::InvalidState(
                "Session is already closed".to_string(),
            ));
        }

        // Zero-minute sessions close without a ledger entry.
        if points_earned > 0 {
            PointRepo::append(
                &mut tx,
                &CreatePointEntry {
                    user_id: session.user_id,
                    amount: points_earned,
                    transaction_type: transaction_type::PRESENCE,
                    reference_id: Some(session.id),
                    description: Some(format!(
                        "Presence session of {duration_minutes} minutes"
                    )),
                },
            )
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        // Marker cleanup happens after commit; if it fails the session is
        // still closed and the marker lapses on its own TTL.
        if let Err(e) = self.store.del(&Self::marker_key(session.user_id)).await {
            tracing::warn!(user_id = session.user_id, error = %e, "failed to clear session marker");
        }

        Ok(SessionSummary {
            session_id: session.id,
            end_time,
            duration_minutes,
            points_earned,
        })
    }
}

//! Repository for the `presence_sessions` table.

use canopy_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::presence_session::{status, CreatePresenceSession, PresenceSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, start_time, end_time, duration_minutes, points_earned, \
                        status, last_heartbeat, device_id, ip_address, created_at, updated_at";

/// Provides presence session lifecycle queries.
pub struct PresenceSessionRepo;

impl PresenceSessionRepo {
    /// Insert a new active session with `last_heartbeat = start_time`.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePresenceSession,
    ) -> Result<PresenceSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO presence_sessions
                (user_id, start_time, last_heartbeat, status, device_id, ip_address)
             VALUES ($1, $2, $2, '{active}', $3, $4)
             RETURNING {COLUMNS}",
            active = status::ACTIVE
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(input.user_id)
            .bind(input.start_time)
            .bind(&input.device_id)
            .bind(&input.ip_address)
            .fetch_one(pool)
            .await
    }

    /// Find a session by id, scoped to its owner.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<PresenceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presence_sessions WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the user's currently active session, if any.
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<PresenceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presence_sessions
             WHERE user_id = $1 AND status = '{active}'
             ORDER BY start_time DESC
             LIMIT 1",
            active = status::ACTIVE
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Update `last_heartbeat` on an active session, returning the refreshed
    /// row. Returns `None` if the session is no longer active (the guard is
    /// part of the UPDATE, so a racing close wins cleanly).
    pub async fn touch_heartbeat(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        at: Timestamp,
    ) -> Result<Option<PresenceSession>, sqlx::Error> {
        let query = format!(
            "UPDATE presence_sessions
             SET last_heartbeat = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND status = '{active}'
             RETURNING {COLUMNS}",
            active = status::ACTIVE
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(id)
            .bind(user_id)
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    /// Transition an active session to `completed` with its terminal fields.
    ///
    /// Guarded by `status = 'active'`: returns `false` when the session was
    /// already closed, which is how the loser of an end-vs-sweep race finds
    /// out. Runs inside the caller's transaction.
    pub async fn complete(
        conn: &mut PgConnection,
        id: DbId,
        end_time: Timestamp,
        duration_minutes: i64,
        points_earned: i64,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE presence_sessions
             SET status = '{completed}', end_time = $2, duration_minutes = $3,
                 points_earned = $4, updated_at = NOW()
             WHERE id = $1 AND status = '{active}'",
            completed = status::COMPLETED,
            active = status::ACTIVE
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(end_time)
            .bind(duration_minutes)
            .bind(points_earned)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List active sessions whose last heartbeat is older than `cutoff`.
    ///
    /// Sessions that never received a heartbeat are compared by start time.
    pub async fn list_timed_out(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<PresenceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presence_sessions
             WHERE status = '{active}' AND COALESCE(last_heartbeat, start_time) < $1
             ORDER BY last_heartbeat ASC",
            active = status::ACTIVE
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Paginated session history for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PresenceSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presence_sessions
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PresenceSession>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total session count for a user (pagination metadata).
    pub async fn count_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM presence_sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}

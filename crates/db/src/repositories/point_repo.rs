//! Repository for the `points` ledger.
//!
//! The ledger is append-only and is the single source of truth for an
//! account's balance; the `users` table carries a denormalized projection
//! that [`PointRepo::append`] keeps in lockstep.

use canopy_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::point::{CreatePointEntry, PointEntry};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, user_id, amount, transaction_type, reference_id, description, balance_after, created_at";

/// Provides append and read operations for the points ledger.
pub struct PointRepo;

impl PointRepo {
    /// Append a ledger entry and update the user's denormalized totals.
    ///
    /// Locks the user row (`FOR UPDATE`) so concurrent appends for the same
    /// account serialize and every entry's `balance_after` snapshot is
    /// consistent. Must run inside the caller's transaction; if the caller
    /// rolls back, neither the entry nor the projection update survives.
    pub async fn append(
        conn: &mut PgConnection,
        input: &CreatePointEntry,
    ) -> Result<PointEntry, sqlx::Error> {
        let available: i64 =
            sqlx::query_scalar("SELECT available_points FROM users WHERE id = $1 FOR UPDATE")
                .bind(input.user_id)
                .fetch_one(&mut *conn)
                .await?;

        let balance_after = available + input.amount;

        let query = format!(
            "INSERT INTO points (user_id, amount, transaction_type, reference_id, description, balance_after)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, PointEntry>(&query)
            .bind(input.user_id)
            .bind(input.amount)
            .bind(input.transaction_type)
            .bind(input.reference_id)
            .bind(&input.description)
            .bind(balance_after)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(
            "UPDATE users
             SET available_points = $2,
                 total_points = total_points + GREATEST($3, 0),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(input.user_id)
        .bind(balance_after)
        .bind(input.amount)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Current balance: the newest entry's `balance_after`, or 0 with no history.
    pub async fn latest_balance(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let balance: Option<i64> = sqlx::query_scalar(
            "SELECT balance_after FROM points
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(balance.unwrap_or(0))
    }

    /// Paginated transaction history for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PointEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM points
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PointEntry>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total entry count for a user (pagination metadata).
    pub async fn count_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM points WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Ledger entries referencing a presence session. Used to assert the
    /// one-entry-per-session invariant.
    pub async fn list_by_reference(
        pool: &PgPool,
        reference_id: DbId,
    ) -> Result<Vec<PointEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM points WHERE reference_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, PointEntry>(&query)
            .bind(reference_id)
            .fetch_all(pool)
            .await
    }
}

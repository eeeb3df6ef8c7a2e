//! Repository for the `user_devices` table.
//!
//! Soft-deleted rows (`deleted_at IS NOT NULL`) are excluded from every
//! lookup; removal keeps the row for audit.

use canopy_core::types::DbId;
use sqlx::PgPool;

use crate::models::device::{Device, DeviceInfo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, device_id, device_name, device_type, device_os, \
                        device_model, browser, ip_address, is_active, last_active, \
                        logged_out_at, deleted_at, created_at, updated_at";

/// Provides device lookups and lifecycle updates.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Find a device by its owner and client-issued device identifier.
    pub async fn find_by_user_and_device(
        pool: &PgPool,
        user_id: DbId,
        device_id: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_devices
             WHERE user_id = $1 AND device_id = $2 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the most recently active device currently marked active for the
    /// user, if any.
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_devices
             WHERE user_id = $1 AND is_active = true AND deleted_at IS NULL
             ORDER BY last_active DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Create the device row, or reactivate an existing one with refreshed
    /// metadata. Either way the row ends active with `logged_out_at` cleared
    /// and `last_active` stamped.
    pub async fn upsert_registration(
        pool: &PgPool,
        user_id: DbId,
        info: &DeviceInfo,
    ) -> Result<Device, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_devices
                (user_id, device_id, device_name, device_type, device_os,
                 device_model, browser, ip_address, is_active, last_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, NOW())
             ON CONFLICT (user_id, device_id) DO UPDATE SET
                device_name = EXCLUDED.device_name,
                device_type = EXCLUDED.device_type,
                device_os = EXCLUDED.device_os,
                device_model = EXCLUDED.device_model,
                browser = EXCLUDED.browser,
                ip_address = EXCLUDED.ip_address,
                is_active = true,
                last_active = NOW(),
                logged_out_at = NULL,
                deleted_at = NULL,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .bind(&info.device_id)
            .bind(&info.device_name)
            .bind(&info.device_type)
            .bind(&info.device_os)
            .bind(&info.device_model)
            .bind(&info.browser)
            .bind(&info.ip_address)
            .fetch_one(pool)
            .await
    }

    /// Clear the active flag and stamp `logged_out_at`.
    ///
    /// Returns `true` if the row transitioned from active to logged out.
    pub async fn mark_logged_out(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_devices
             SET is_active = false, logged_out_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every active device for the user as logged out.
    ///
    /// Returns the number of devices affected.
    pub async fn mark_all_logged_out(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_devices
             SET is_active = false, logged_out_at = NOW(), updated_at = NOW()
             WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Refresh `last_active` after a successful login on a recognized device.
    pub async fn touch_activity(
        pool: &PgPool,
        user_id: DbId,
        device_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_devices SET last_active = NOW(), updated_at = NOW()
             WHERE user_id = $1 AND device_id = $2 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(device_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List all of a user's devices, most recently active first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_devices
             WHERE user_id = $1 AND deleted_at IS NULL
             ORDER BY last_active DESC"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// List only the user's currently active devices.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_devices
             WHERE user_id = $1 AND is_active = true AND deleted_at IS NULL
             ORDER BY last_active DESC"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Soft-delete a device. Returns the deleted row if it existed.
    pub async fn soft_delete(
        pool: &PgPool,
        user_id: DbId,
        device_id: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "UPDATE user_devices
             SET deleted_at = NOW(), is_active = false, updated_at = NOW()
             WHERE user_id = $1 AND device_id = $2 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }
}

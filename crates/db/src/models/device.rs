//! User device model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A device row from the `user_devices` table.
///
/// One row per `(user_id, device_id)` pair, where `device_id` is the stable
/// identifier the client generates on install. Soft-deleted rows keep their
/// `deleted_at` timestamp and are excluded from all lookups.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub user_id: DbId,
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: String,
    pub device_os: Option<String>,
    pub device_model: Option<String>,
    pub browser: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub last_active: Timestamp,
    pub logged_out_at: Option<Timestamp>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Client-supplied device metadata accompanying a device-aware login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: Option<String>,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    pub device_os: Option<String>,
    pub device_model: Option<String>,
    pub browser: Option<String>,
    #[serde(skip)]
    pub ip_address: Option<String>,
}

fn default_device_type() -> String {
    "unknown".to_string()
}

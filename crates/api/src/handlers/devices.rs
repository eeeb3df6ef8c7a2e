//! Handlers for the `/devices` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use canopy_db::models::device::Device;
use canopy_db::repositories::DeviceRepo;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/devices
///
/// All of the user's registered devices, most recently active first.
pub async fn list(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Device>>>> {
    let devices = DeviceRepo::list_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(DataResponse { data: devices }))
}

/// GET /api/v1/devices/active
///
/// Only devices currently holding an active login. Under the
/// one-active-device policy this is at most one row.
pub async fn list_active(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Device>>>> {
    let devices = DeviceRepo::list_active_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(DataResponse { data: devices }))
}

/// POST /api/v1/devices/{device_id}/logout
///
/// Log the device out. Token revocation is account-wide: the user's other
/// tokens (if any) are revoked too. 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<StatusCode> {
    state.devices.logout(auth_user.user_id, &device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/devices/logout-all
///
/// Log every device out and revoke all tokens. 204 No Content.
pub async fn logout_all(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<StatusCode> {
    state.devices.logout_all(auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/devices/{device_id}
///
/// Soft-delete a device registration. Removing the active device also
/// revokes the user's tokens.
pub async fn remove(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<Json<DataResponse<Device>>> {
    let device = state.devices.remove(auth_user.user_id, &device_id).await?;
    Ok(Json(DataResponse { data: device }))
}

//! Handlers for the `/presence` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;
use serde::Deserialize;

use canopy_db::models::presence_session::PresenceSession;
use canopy_db::repositories::PresenceSessionRepo;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::{DataResponse, PaginatedResponse};
use crate::services::presence::{HeartbeatAck, SessionSummary};
use crate::state::AppState;

/// Request body for `POST /presence/sessions`.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Device the session is running on, if the client tracks devices.
    pub device_id: Option<String>,
}

/// POST /api/v1/presence/sessions
///
/// Start a presence session. 409 Conflict if one is already active.
pub async fn start(
    State(state): State<AppState>,
    auth_user: AuthUser,
    body: Option<Json<StartSessionRequest>>,
) -> AppResult<(StatusCode, Json<DataResponse<PresenceSession>>)> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let session = state
        .presence
        .start(auth_user.user_id, input.device_id, None)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: session })))
}

/// Request body for `POST /presence/sessions/heartbeat`.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub session_id: DbId,
}

/// POST /api/v1/presence/sessions/heartbeat
///
/// Record a heartbeat on the named session and preview its running total.
/// 404 for an unknown session, 409 for one that already closed.
pub async fn heartbeat(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<HeartbeatRequest>,
) -> AppResult<Json<DataResponse<HeartbeatAck>>> {
    let ack = state
        .presence
        .heartbeat(auth_user.user_id, input.session_id)
        .await?;
    Ok(Json(DataResponse { data: ack }))
}

/// POST /api/v1/presence/sessions/{id}/end
///
/// End the session, awarding points for its whole elapsed minutes.
/// 404 for an unknown session, 409 for one that already closed.
pub async fn end(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SessionSummary>>> {
    let summary = state.presence.end(auth_user.user_id, id).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/presence/sessions/active
///
/// The caller's active session, or 404.
pub async fn active(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<PresenceSession>>> {
    let session = state
        .presence
        .active_session(auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Active session" })?;
    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/presence/sessions
///
/// Paginated session history, newest first.
pub async fn history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<PaginatedResponse<PresenceSession>>> {
    let sessions = PresenceSessionRepo::list_for_user(
        &state.pool,
        auth_user.user_id,
        params.limit(),
        params.offset(),
    )
    .await?;
    let total = PresenceSessionRepo::count_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(PaginatedResponse {
        data: sessions,
        total,
        limit: params.limit(),
        offset: params.offset(),
    }))
}

/// GET /api/v1/presence/sessions/{id}
///
/// A single session, scoped to its owner.
pub async fn get(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PresenceSession>>> {
    let session = PresenceSessionRepo::find_for_user(&state.pool, id, auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Session" })?;
    Ok(Json(DataResponse { data: session }))
}

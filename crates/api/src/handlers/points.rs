//! Handlers for the `/points` resource.

use axum::extract::{Query, State};
use axum::Json;
use canopy_core::error::CoreError;
use serde::Serialize;

use canopy_db::models::point::PointEntry;
use canopy_db::repositories::{PointRepo, UserRepo};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::{DataResponse, PaginatedResponse};
use crate::state::AppState;

/// Balance payload combining the denormalized projection and the ledger.
///
/// `available_points` mirrors the newest entry's `balance_after`; both are
/// reported so clients can observe the two views agreeing.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub available_points: i64,
    pub total_points: i64,
    /// `balance_after` of the newest ledger entry (0 with no history).
    pub ledger_balance: i64,
}

/// GET /api/v1/points/balance
pub async fn balance(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<BalanceResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "User" })?;
    let ledger_balance = PointRepo::latest_balance(&state.pool, auth_user.user_id).await?;

    Ok(Json(DataResponse {
        data: BalanceResponse {
            available_points: user.available_points,
            total_points: user.total_points,
            ledger_balance,
        },
    }))
}

/// GET /api/v1/points/history
///
/// Paginated ledger history, newest first.
pub async fn history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<PaginatedResponse<PointEntry>>> {
    let entries = PointRepo::list_for_user(
        &state.pool,
        auth_user.user_id,
        params.limit(),
        params.offset(),
    )
    .await?;
    let total = PointRepo::count_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(PaginatedResponse {
        data: entries,
        total,
        limit: params.limit(),
        offset: params.offset(),
    }))
}

//! Handlers for the `/auth` resource.
//!
//! Credential failures are uniformly low-information: an unknown identifier
//! and a wrong password both answer `InvalidCredentials`, and the
//! forgot-password endpoint answers the same message whether or not the
//! email exists.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use canopy_core::codes;
use canopy_core::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use canopy_db::models::device::DeviceInfo;
use canopy_db::models::user::{CreateUser, User, UserResponse};
use canopy_db::repositories::UserRepo;

use crate::auth::jwt::validate_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::services::device_trust::TrustOutcome;
use crate::services::otp_store::OpaqueTokenKind;
use crate::state::AppState;

/// Validity window for password-reset tokens.
const RESET_TOKEN_TTL: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub phone_number: Option<String>,
    pub password: String,
    pub full_name: String,
    /// Another user's referral code, if this signup was referred.
    pub referred_by: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or phone number.
    pub identifier: String,
    pub password: String,
}

/// Request body for `POST /auth/login-device`.
#[derive(Debug, Deserialize)]
pub struct DeviceLoginRequest {
    pub identifier: String,
    pub password: String,
    pub device: DeviceInfo,
}

/// Request body for `POST /auth/verify-device`.
#[derive(Debug, Deserialize)]
pub struct VerifyDeviceRequest {
    pub identifier: String,
    pub password: String,
    pub code: String,
    pub device: DeviceInfo,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for `POST /auth/forgot-password`.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for `POST /auth/reset-password`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Successful authentication response returned by login, verify-device, and
/// refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Response for a device-aware login.
///
/// Serializes either as a full [`AuthResponse`] or as a step-up marker.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DeviceLoginResponse {
    Authenticated(AuthResponse),
    StepUpRequired {
        step_up_required: bool,
        message: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account. Every user gets a referral code of their own; a
/// provided `referred_by` code must belong to an existing user.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    validate_password_strength(&input.password).map_err(CoreError::Validation)?;

    if UserRepo::find_by_email_or_phone(&state.pool, &input.email, input.phone_number.as_deref())
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "Email or phone number already registered".into(),
        )));
    }

    if let Some(code) = &input.referred_by {
        UserRepo::find_by_referral_code(&state.pool, code)
            .await?
            .ok_or_else(|| CoreError::Validation("Unknown referral code".into()))?;
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email: input.email,
            phone_number: input.phone_number,
            password_hash,
            full_name: input.full_name,
            referral_code: codes::referral_code(),
            referred_by: input.referred_by,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email/phone + password. No device policy is applied;
/// clients that track devices use `login-device`.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = authenticate(&state, &input.identifier, &input.password).await?;
    UserRepo::record_login(&state.pool, user.id).await?;
    Ok(Json(issue_auth_response(&state, &user).await?))
}

/// POST /api/v1/auth/login-device
///
/// Device-aware login. A recognized device gets tokens immediately (evicting
/// any other active device); an unrecognized one triggers an OTP step-up and
/// gets no tokens yet.
pub async fn login_device(
    State(state): State<AppState>,
    Json(input): Json<DeviceLoginRequest>,
) -> AppResult<Json<DeviceLoginResponse>> {
    let user = authenticate(&state, &input.identifier, &input.password).await?;

    match state.devices.evaluate(&user, &input.device).await? {
        TrustOutcome::Trusted(_) => {
            UserRepo::record_login(&state.pool, user.id).await?;
            let response = issue_auth_response(&state, &user).await?;
            Ok(Json(DeviceLoginResponse::Authenticated(response)))
        }
        TrustOutcome::StepUpRequired => Ok(Json(DeviceLoginResponse::StepUpRequired {
            step_up_required: true,
            message: "Verification code sent. Confirm this device to continue.",
        })),
    }
}

/// POST /api/v1/auth/verify-device
///
/// Complete the step-up for an unrecognized device and log in.
pub async fn verify_device(
    State(state): State<AppState>,
    Json(input): Json<VerifyDeviceRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = authenticate(&state, &input.identifier, &input.password).await?;

    state
        .devices
        .verify_step_up(&user, &input.device, &input.code)
        .await?;

    UserRepo::record_login(&state.pool, user.id).await?;
    Ok(Json(issue_auth_response(&state, &user).await?))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a valid refresh token for a new pair. Rotation is all-or-nothing:
/// the old pair (and any other outstanding tokens) is revoked before the new
/// pair is minted.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let claims = validate_token(&input.refresh_token, &state.config.jwt).map_err(|_| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid or expired refresh token".into(),
        ))
    })?;

    // An access token presented here fails the lookup: its jti was never
    // recorded under a refresh key.
    state
        .tokens
        .verify_refresh(claims.sub, &claims.jti, &input.refresh_token)
        .await?;

    let user = UserRepo::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("User no longer exists".into()))?;
    if !user.is_active {
        return Err(AppError::Core(CoreError::AccountInactive));
    }

    // Rotate: the presented token (and its siblings) die with the old set.
    state.tokens.revoke_all(user.id).await?;
    Ok(Json(issue_auth_response(&state, &user).await?))
}

/// POST /api/v1/auth/logout
///
/// Revoke every outstanding token for the authenticated user. 204 No Content.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    state.tokens.revoke_all(auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/profile
///
/// The authenticated user's profile, served from the token-store snapshot
/// when available and from the database otherwise.
pub async fn profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    if let Some(cached) = state.tokens.cached_user_info(auth_user.user_id).await? {
        return Ok(Json(DataResponse { data: cached }));
    }

    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "User" })?;
    let data = serde_json::to_value(UserResponse::from(&user))
        .map_err(|e| AppError::InternalError(format!("Profile encode error: {e}")))?;
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/auth/forgot-password
///
/// Issue a password-reset token. Always answers the same message so the
/// endpoint cannot be used to probe which emails are registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if let Some(user) = UserRepo::find_by_email(&state.pool, &input.email).await? {
        let token = state
            .otp
            .issue_opaque_token(
                OpaqueTokenKind::PasswordReset,
                user.id,
                json!({ "email": user.email }),
                RESET_TOKEN_TTL,
            )
            .await?;

        // Fire-and-forget delivery.
        let notifier = Arc::clone(&state.notifier);
        let email = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_password_reset(&email, &token).await {
                tracing::error!(error = %e, "password reset email failed");
            }
        });
    }

    Ok(Json(json!({
        "data": { "message": "If that email is registered, a reset token has been sent." }
    })))
}

/// POST /api/v1/auth/reset-password
///
/// Consume a reset token and set a new password. All outstanding tokens are
/// revoked so stolen sessions do not survive the reset.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_password_strength(&input.new_password).map_err(CoreError::Validation)?;

    let payload = state
        .otp
        .consume_opaque_token(OpaqueTokenKind::PasswordReset, &input.token)
        .await?;

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if !UserRepo::update_password(&state.pool, payload.account_id, &password_hash).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "User" }));
    }
    state.tokens.revoke_all(payload.account_id).await?;

    tracing::info!(user_id = payload.account_id, "password reset completed");
    Ok(Json(json!({
        "data": { "message": "Password updated. Please log in again." }
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve credentials to an active user, or `InvalidCredentials`.
async fn authenticate(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = UserRepo::find_by_email_or_phone(&state.pool, identifier, Some(identifier))
        .await?
        .ok_or(CoreError::InvalidCredentials)?;

    let password_valid = verify_password(password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(AppError::Core(CoreError::InvalidCredentials));
    }

    if !user.is_active {
        return Err(AppError::Core(CoreError::AccountInactive));
    }
    Ok(user)
}

/// Mint a token pair and assemble the response body.
async fn issue_auth_response(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let user_response = UserResponse::from(user);
    let user_info = serde_json::to_value(&user_response)
        .map_err(|e| AppError::InternalError(format!("User info encode error: {e}")))?;

    let pair = state.tokens.issue_pair(user.id, user_info).await?;

    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
        user: user_response,
    })
}

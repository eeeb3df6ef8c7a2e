//! Single-active-device trust policy.
//!
//! A user may hold live tokens on at most one device. Logging in from a
//! recognized device evicts whichever device was active before: its row is
//! marked logged out and every outstanding token is revoked, strictly
//! before the new pair is minted, so there is no window in which two devices
//! hold live tokens. An unrecognized device must first pass an OTP step-up;
//! only a successful verification registers the device and performs the same
//! eviction.

use std::sync::Arc;

use canopy_core::error::CoreError;
use canopy_db::models::device::{Device, DeviceInfo};
use canopy_db::models::user::User;
use canopy_db::repositories::DeviceRepo;
use canopy_db::DbPool;

use crate::error::db_err;
use crate::mailer::Notifier;
use crate::services::otp_store::{OtpPurpose, OtpStore};
use crate::services::token_store::TokenStore;

/// Outcome of presenting a device at login.
#[derive(Debug)]
pub enum TrustOutcome {
    /// The device is trusted; tokens may be minted for it.
    Trusted(Device),
    /// The device is unknown; a verification code was dispatched and the
    /// login must be completed via the step-up endpoint.
    StepUpRequired,
}

/// Enforces the one-active-device policy.
pub struct DeviceTrust {
    pool: DbPool,
    otp: Arc<OtpStore>,
    tokens: Arc<TokenStore>,
    notifier: Arc<dyn Notifier>,
}

impl DeviceTrust {
    pub fn new(
        pool: DbPool,
        otp: Arc<OtpStore>,
        tokens: Arc<TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            otp,
            tokens,
            notifier,
        }
    }

    /// Evaluate a device presented at login.
    ///
    /// Recognized devices (a non-deleted row exists for the pair) are
    /// trusted immediately: any other active device is evicted, then this
    /// row's metadata and activity stamp are refreshed. Unrecognized devices
    /// get an OTP challenge delivered out-of-band and are not trusted yet.
    pub async fn evaluate(&self, user: &User, info: &DeviceInfo) -> Result<TrustOutcome, CoreError> {
        let known = DeviceRepo::find_by_user_and_device(&self.pool, user.id, &info.device_id)
            .await
            .map_err(db_err)?;

        match known {
            Some(device) => {
                self.evict_others(user.id, &info.device_id).await?;
                // Re-upsert rather than only touching: a previously
                // logged-out row must come back active, and metadata may
                // have changed since registration.
                let device = if device.is_active {
                    DeviceRepo::touch_activity(&self.pool, user.id, &info.device_id)
                        .await
                        .map_err(db_err)?;
                    device
                } else {
                    DeviceRepo::upsert_registration(&self.pool, user.id, info)
                        .await
                        .map_err(db_err)?
                };
                tracing::info!(user_id = user.id, device_id = %info.device_id, "recognized device trusted");
                Ok(TrustOutcome::Trusted(device))
            }
            None => {
                self.dispatch_challenge(user, info).await?;
                Ok(TrustOutcome::StepUpRequired)
            }
        }
    }

    /// Complete the step-up for an unrecognized device.
    ///
    /// Verifies the OTP, evicts any currently active device, then registers
    /// this one. OTP failures pass through unchanged (`InvalidCode`,
    /// `TooManyAttempts`, `NotFound`).
    pub async fn verify_step_up(
        &self,
        user: &User,
        info: &DeviceInfo,
        code: &str,
    ) -> Result<Device, CoreError> {
        self.otp
            .verify(
                OtpPurpose::DeviceVerification,
                &info.device_id,
                code,
                Some(user.id),
            )
            .await?;

        self.evict_others(user.id, &info.device_id).await?;
        let device = DeviceRepo::upsert_registration(&self.pool, user.id, info)
            .await
            .map_err(db_err)?;
        tracing::info!(user_id = user.id, device_id = %info.device_id, "device verified and registered");
        Ok(device)
    }

    /// Re-send a device verification code.
    pub async fn resend_challenge(&self, user: &User, info: &DeviceInfo) -> Result<(), CoreError> {
        self.dispatch_challenge(user, info).await
    }

    /// Log the given device out and revoke the user's tokens.
    pub async fn logout(&self, user_id: canopy_core::types::DbId, device_id: &str) -> Result<(), CoreError> {
        if let Some(device) = DeviceRepo::find_by_user_and_device(&self.pool, user_id, device_id)
            .await
            .map_err(db_err)?
        {
            DeviceRepo::mark_logged_out(&self.pool, device.id)
                .await
                .map_err(db_err)?;
        }
        self.tokens.revoke_all(user_id).await
    }

    /// Log every device out and revoke the user's tokens.
    pub async fn logout_all(&self, user_id: canopy_core::types::DbId) -> Result<u64, CoreError> {
        let count = DeviceRepo::mark_all_logged_out(&self.pool, user_id)
            .await
            .map_err(db_err)?;
        self.tokens.revoke_all(user_id).await?;
        Ok(count)
    }

    /// Soft-delete a device registration.
    ///
    /// Removing the currently active device also revokes the user's tokens;
    /// removing a dormant one does not disturb the active login.
    pub async fn remove(
        &self,
        user_id: canopy_core::types::DbId,
        device_id: &str,
    ) -> Result<Device, CoreError> {
        // Capture the active flag before the delete clears it.
        let was_active = DeviceRepo::find_by_user_and_device(&self.pool, user_id, device_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound { entity: "Device" })?
            .is_active;

        let device = DeviceRepo::soft_delete(&self.pool, user_id, device_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound { entity: "Device" })?;
        if was_active {
            self.tokens.revoke_all(user_id).await?;
        }
        Ok(device)
    }

    /// Evict whichever device is currently active, unless it is `keep`.
    ///
    /// Ordering matters: the displaced device loses its row's active flag
    /// AND its tokens before the caller mints anything new.
    async fn evict_others(&self, user_id: canopy_core::types::DbId, keep: &str) -> Result<(), CoreError> {
        let active = DeviceRepo::find_active_for_user(&self.pool, user_id)
            .await
            .map_err(db_err)?;
        if let Some(active) = active {
            if active.device_id != keep {
                DeviceRepo::mark_all_logged_out(&self.pool, user_id)
                    .await
                    .map_err(db_err)?;
                self.tokens.revoke_all(user_id).await?;
                tracing::info!(
                    user_id,
                    evicted = %active.device_id,
                    replacement = %keep,
                    "active device evicted"
                );
            }
        }
        Ok(())
    }

    async fn dispatch_challenge(&self, user: &User, info: &DeviceInfo) -> Result<(), CoreError> {
        let code = self
            .otp
            .issue(
                OtpPurpose::DeviceVerification,
                &info.device_id,
                Some(user.id),
                Some(serde_json::json!({ "device_name": info.device_name })),
            )
            .await?;

        // Fire-and-forget: a delivery failure must not fail the login.
        let notifier = Arc::clone(&self.notifier);
        let email = user.email.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_verification_code(&email, &code, "new device")
                .await
            {
                tracing::error!(error = %e, "device verification email failed");
            }
        });

        tracing::info!(user_id = user.id, device_id = %info.device_id, "device step-up challenge issued");
        Ok(())
    }
}

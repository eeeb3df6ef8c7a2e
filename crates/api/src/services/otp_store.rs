//! One-time codes and opaque bearer tokens backed by the ephemeral store.
//!
//! Challenges are keyed by purpose + identifier, carry a SHA-256 hash of the
//! code (never the plaintext), and self-expire with their purpose-specific
//! TTL; no cleanup job exists. Verification is one-time-use: a successful
//! match deletes the challenge. The attempt counter lives in a sibling key
//! updated with the store's atomic `incr`, so concurrent wrong guesses cannot
//! lose an update and slip past the cap.

use std::sync::Arc;
use std::time::Duration;

use canopy_core::codes;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;
use canopy_cache::EphemeralStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum failed verification attempts before a challenge is burned.
pub const MAX_ATTEMPTS: u32 = 5;

/// What a one-time code is protecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    EmailVerification,
    PhoneVerification,
    PasswordReset,
    DeviceVerification,
    TwoFactor,
}

impl OtpPurpose {
    /// Key segment for this purpose.
    fn as_str(self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "email-verification",
            OtpPurpose::PhoneVerification => "phone-verification",
            OtpPurpose::PasswordReset => "password-reset",
            OtpPurpose::DeviceVerification => "device-verification",
            OtpPurpose::TwoFactor => "two-factor",
        }
    }

    /// Validity window for codes issued under this purpose.
    pub fn ttl(self) -> Duration {
        match self {
            // Password reset links travel by email; give them longer.
            OtpPurpose::PasswordReset => Duration::from_secs(600),
            _ => Duration::from_secs(300),
        }
    }

    /// Whether challenge keys under this purpose are scoped to an account.
    fn requires_account(self) -> bool {
        matches!(self, OtpPurpose::DeviceVerification | OtpPurpose::TwoFactor)
    }
}

/// Kinds of opaque one-time bearer tokens (out-of-band links).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueTokenKind {
    EmailVerification,
    PasswordReset,
}

impl OpaqueTokenKind {
    fn as_str(self) -> &'static str {
        match self {
            OpaqueTokenKind::EmailVerification => "email-verification",
            OpaqueTokenKind::PasswordReset => "password-reset",
        }
    }
}

/// Challenge record stored (as JSON) in the ephemeral store.
#[derive(Debug, Serialize, Deserialize)]
struct Challenge {
    /// SHA-256 hex digest of the code.
    code_hash: String,
    account_id: Option<DbId>,
    created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

/// Payload stored behind an opaque bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpaquePayload {
    pub account_id: DbId,
    pub data: serde_json::Value,
    pub created_at: i64,
}

/// Issues and verifies short-lived one-time secrets.
pub struct OtpStore {
    store: Arc<dyn EphemeralStore>,
}

impl OtpStore {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    fn challenge_key(purpose: OtpPurpose, identifier: &str, account_id: Option<DbId>) -> String {
        match (purpose.requires_account(), account_id) {
            (true, Some(id)) => format!("otp:{}:{}:{}", purpose.as_str(), identifier, id),
            _ => format!("otp:{}:{}", purpose.as_str(), identifier),
        }
    }

    fn attempts_key(challenge_key: &str) -> String {
        format!("{challenge_key}:attempts")
    }

    /// Issue a fresh challenge, replacing any outstanding one for the same
    /// key and resetting its attempt counter.
    ///
    /// Returns the plaintext code for out-of-band delivery; only its hash is
    /// stored.
    pub async fn issue(
        &self,
        purpose: OtpPurpose,
        identifier: &str,
        account_id: Option<DbId>,
        metadata: Option<serde_json::Value>,
    ) -> Result<String, CoreError> {
        let code = codes::numeric_code(codes::OTP_CODE_LENGTH);
        let challenge = Challenge {
            code_hash: sha256_hex(&code),
            account_id,
            created_at: chrono::Utc::now().timestamp(),
            metadata,
        };
        let key = Self::challenge_key(purpose, identifier, account_id);
        let value = serde_json::to_string(&challenge)
            .map_err(|e| CoreError::Internal(format!("challenge encode: {e}")))?;

        let ttl = purpose.ttl();
        self.store.set(&key, &value, ttl).await?;
        self.store.del(&Self::attempts_key(&key)).await?;

        tracing::info!(purpose = purpose.as_str(), identifier, ttl_secs = ttl.as_secs(), "OTP issued");
        Ok(code)
    }

    /// Verify a code against the outstanding challenge.
    ///
    /// An absent challenge (expired or never issued, the caller cannot tell
    /// which) fails with `NotFound`. A challenge at the attempt cap is
    /// deleted and fails with `TooManyAttempts` even if this code is correct.
    /// A mismatch atomically increments the counter and fails with
    /// `InvalidCode`; a match deletes the challenge (one-time use).
    pub async fn verify(
        &self,
        purpose: OtpPurpose,
        identifier: &str,
        code: &str,
        account_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        let key = Self::challenge_key(purpose, identifier, account_id);
        let attempts_key = Self::attempts_key(&key);

        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or(CoreError::NotFound { entity: "Verification code" })?;
        let challenge: Challenge = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("challenge decode: {e}")))?;

        let attempts: u32 = match self.store.get(&attempts_key).await? {
            Some(v) => v.parse().unwrap_or(0),
            None => 0,
        };
        if attempts >= MAX_ATTEMPTS {
            self.store.del(&key).await?;
            self.store.del(&attempts_key).await?;
            tracing::warn!(key, "OTP attempt cap reached, challenge burned");
            return Err(CoreError::TooManyAttempts);
        }

        if sha256_hex(code) != challenge.code_hash {
            let attempts = self.store.incr(&attempts_key).await? as u32;
            // Keep the counter's lifetime aligned with the challenge.
            if let Some(remaining) = self.store.ttl(&key).await? {
                self.store.expire(&attempts_key, remaining).await?;
            }
            let remaining = MAX_ATTEMPTS.saturating_sub(attempts);
            tracing::warn!(key, attempts, "invalid OTP attempt");
            return Err(CoreError::InvalidCode { remaining });
        }

        // One-time use: a matched challenge is gone.
        self.store.del(&key).await?;
        self.store.del(&attempts_key).await?;
        tracing::info!(key, "OTP verified");
        Ok(())
    }

    /// Remaining validity of an outstanding challenge, if any.
    pub async fn remaining_ttl(
        &self,
        purpose: OtpPurpose,
        identifier: &str,
        account_id: Option<DbId>,
    ) -> Result<Option<Duration>, CoreError> {
        let key = Self::challenge_key(purpose, identifier, account_id);
        self.store.ttl(&key).await
    }

    /// Invalidate an outstanding challenge without consuming it.
    pub async fn invalidate(
        &self,
        purpose: OtpPurpose,
        identifier: &str,
        account_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        let key = Self::challenge_key(purpose, identifier, account_id);
        self.store.del(&Self::attempts_key(&key)).await?;
        self.store.del(&key).await
    }

    /// Issue an opaque one-time bearer token carrying a JSON payload.
    pub async fn issue_opaque_token(
        &self,
        kind: OpaqueTokenKind,
        account_id: DbId,
        data: serde_json::Value,
        ttl: Duration,
    ) -> Result<String, CoreError> {
        let token = codes::opaque_token();
        let payload = OpaquePayload {
            account_id,
            data,
            created_at: chrono::Utc::now().timestamp(),
        };
        let key = format!("token:{}:{}", kind.as_str(), token);
        let value = serde_json::to_string(&payload)
            .map_err(|e| CoreError::Internal(format!("token payload encode: {e}")))?;
        self.store.set(&key, &value, ttl).await?;
        tracing::info!(kind = kind.as_str(), account_id, ttl_secs = ttl.as_secs(), "opaque token issued");
        Ok(token)
    }

    /// Consume an opaque token, deleting it and returning its payload.
    ///
    /// Absent and expired tokens are indistinguishable (`NotFound`).
    pub async fn consume_opaque_token(
        &self,
        kind: OpaqueTokenKind,
        token: &str,
    ) -> Result<OpaquePayload, CoreError> {
        let key = format!("token:{}:{}", kind.as_str(), token);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or(CoreError::NotFound { entity: "Token" })?;
        self.store.del(&key).await?;
        serde_json::from_str(&raw).map_err(|e| CoreError::Internal(format!("token payload decode: {e}")))
    }
}

/// SHA-256 hex digest.
fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

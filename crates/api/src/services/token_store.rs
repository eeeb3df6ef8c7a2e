//! Server-side token records backing JWT issuance and revocation.
//!
//! Every minted JWT gets a mirror record in the ephemeral store whose TTL
//! matches the token's lifetime. Verification requires a live, non-revoked
//! record whose stored token string equals the presented one, so revocation
//! takes effect immediately even though the signature stays valid until
//! `exp`. The per-user index key tracks outstanding refresh `jti`s so a
//! single revocation sweep can flip every record.

use std::sync::Arc;
use std::time::Duration;

use canopy_cache::EphemeralStore;
use canopy_core::error::CoreError;
use canopy_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt::{self, JwtConfig};

/// A freshly minted access/refresh token pair.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds, for client-side scheduling.
    pub expires_in: i64,
}

/// Record mirrored into the ephemeral store for each live token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    token: String,
    revoked: bool,
}

/// Mints JWT pairs and tracks their server-side liveness.
pub struct TokenStore {
    store: Arc<dyn EphemeralStore>,
    config: JwtConfig,
}

impl TokenStore {
    pub fn new(store: Arc<dyn EphemeralStore>, config: JwtConfig) -> Self {
        Self { store, config }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.config
    }

    fn access_key(user_id: DbId) -> String {
        format!("access-token:{user_id}")
    }

    fn refresh_key(user_id: DbId, jti: &str) -> String {
        format!("refresh-token:{user_id}:{jti}")
    }

    fn index_key(user_id: DbId) -> String {
        format!("user-tokens:{user_id}")
    }

    fn info_key(user_id: DbId) -> String {
        format!("user-info:{user_id}")
    }

    /// Mint a fresh access/refresh pair for the user and record both
    /// server-side.
    ///
    /// A user holds at most one live access record, so minting replaces any
    /// previous access token. Refresh records are keyed per `jti` and
    /// appended to the user's index. The `user_info` snapshot is cached for
    /// the refresh window.
    pub async fn issue_pair(
        &self,
        user_id: DbId,
        user_info: serde_json::Value,
    ) -> Result<TokenPair, CoreError> {
        let jti = Uuid::new_v4().to_string();
        let access_token = jwt::generate_access_token(user_id, &self.config)
            .map_err(|e| CoreError::Internal(format!("access token generation: {e}")))?;
        let refresh_token = jwt::generate_refresh_token(user_id, &jti, &self.config)
            .map_err(|e| CoreError::Internal(format!("refresh token generation: {e}")))?;

        let access_ttl = Duration::from_secs(self.config.access_token_expiry_secs.max(0) as u64);
        let refresh_ttl = Duration::from_secs(self.config.refresh_token_expiry_secs.max(0) as u64);

        self.put_record(&Self::access_key(user_id), &access_token, access_ttl)
            .await?;
        self.put_record(&Self::refresh_key(user_id, &jti), &refresh_token, refresh_ttl)
            .await?;

        // Index of outstanding refresh jtis, renewed to the longest-lived
        // member's TTL.
        let mut jtis = self.load_index(user_id).await?;
        jtis.push(jti);
        let encoded = serde_json::to_string(&jtis)
            .map_err(|e| CoreError::Internal(format!("token index encode: {e}")))?;
        self.store
            .set(&Self::index_key(user_id), &encoded, refresh_ttl)
            .await?;

        let info = serde_json::to_string(&user_info)
            .map_err(|e| CoreError::Internal(format!("user info encode: {e}")))?;
        self.store
            .set(&Self::info_key(user_id), &info, refresh_ttl)
            .await?;

        tracing::debug!(user_id, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_expiry_secs,
        })
    }

    /// Check that the presented access token is the user's live, non-revoked
    /// one.
    pub async fn verify_access(&self, user_id: DbId, token: &str) -> Result<(), CoreError> {
        self.verify_record(&Self::access_key(user_id), token).await
    }

    /// Check that the presented refresh token is live and non-revoked under
    /// its `jti`.
    ///
    /// A structurally valid JWT whose `jti` was never recorded (or was
    /// revoked) fails here, which is what makes revocation effective.
    pub async fn verify_refresh(
        &self,
        user_id: DbId,
        jti: &str,
        token: &str,
    ) -> Result<(), CoreError> {
        self.verify_record(&Self::refresh_key(user_id, jti), token)
            .await
    }

    /// Revoke every outstanding token for the user.
    ///
    /// Flips the `revoked` flag on the access record and on each refresh
    /// record in the index, preserving their remaining TTLs, then drops the
    /// index and the cached user snapshot. Idempotent: absent records are
    /// skipped.
    pub async fn revoke_all(&self, user_id: DbId) -> Result<(), CoreError> {
        self.revoke_record(&Self::access_key(user_id)).await?;
        for jti in self.load_index(user_id).await? {
            self.revoke_record(&Self::refresh_key(user_id, &jti)).await?;
        }
        self.store.del(&Self::index_key(user_id)).await?;
        self.store.del(&Self::info_key(user_id)).await?;
        tracing::info!(user_id, "all tokens revoked");
        Ok(())
    }

    /// Cached user snapshot from the last mint, if still live.
    pub async fn cached_user_info(
        &self,
        user_id: DbId,
    ) -> Result<Option<serde_json::Value>, CoreError> {
        match self.store.get(&Self::info_key(user_id)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CoreError::Internal(format!("user info decode: {e}"))),
            None => Ok(None),
        }
    }

    /// Drop the cached user snapshot (on logout or profile change).
    pub async fn remove_user_info(&self, user_id: DbId) -> Result<(), CoreError> {
        self.store.del(&Self::info_key(user_id)).await
    }

    async fn put_record(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), CoreError> {
        let record = TokenRecord {
            token: token.to_string(),
            revoked: false,
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| CoreError::Internal(format!("token record encode: {e}")))?;
        self.store.set(key, &value, ttl).await
    }

    async fn verify_record(&self, key: &str, token: &str) -> Result<(), CoreError> {
        let raw = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("Token revoked or expired".into()))?;
        let record: TokenRecord = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("token record decode: {e}")))?;
        if record.revoked || record.token != token {
            return Err(CoreError::Unauthorized("Token revoked or expired".into()));
        }
        Ok(())
    }

    async fn revoke_record(&self, key: &str) -> Result<(), CoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(());
        };
        let mut record: TokenRecord = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("token record decode: {e}")))?;
        if record.revoked {
            return Ok(());
        }
        record.revoked = true;
        let value = serde_json::to_string(&record)
            .map_err(|e| CoreError::Internal(format!("token record encode: {e}")))?;
        // Keep the record alive for its remaining lifetime so verification
        // keeps seeing an explicit revocation rather than a cache miss.
        let ttl = self
            .store
            .ttl(key)
            .await?
            .unwrap_or(Duration::from_secs(60));
        self.store.set(key, &value, ttl).await
    }

    async fn load_index(&self, user_id: DbId) -> Result<Vec<String>, CoreError> {
        match self.store.get(&Self::index_key(user_id)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| CoreError::Internal(format!("token index decode: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

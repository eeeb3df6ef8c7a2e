use std::sync::Arc;

use canopy_cache::EphemeralStore;

use crate::config::ServerConfig;
use crate::mailer::Notifier;
use crate::services::device_trust::DeviceTrust;
use crate::services::otp_store::OtpStore;
use crate::services::presence::PresenceLifecycle;
use crate::services::token_store::TokenStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: canopy_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Ephemeral key-value store for markers, challenges, and token records.
    pub store: Arc<dyn EphemeralStore>,
    /// One-time codes and opaque tokens.
    pub otp: Arc<OtpStore>,
    /// JWT minting, verification, and revocation.
    pub tokens: Arc<TokenStore>,
    /// Single-active-device policy.
    pub devices: Arc<DeviceTrust>,
    /// Presence session lifecycle.
    pub presence: Arc<PresenceLifecycle>,
    /// Outbound notification delivery.
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Wire up the full service graph over a pool and an ephemeral store.
    pub fn build(
        pool: canopy_db::DbPool,
        config: ServerConfig,
        store: Arc<dyn EphemeralStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let otp = Arc::new(OtpStore::new(Arc::clone(&store)));
        let tokens = Arc::new(TokenStore::new(Arc::clone(&store), config.jwt.clone()));
        let devices = Arc::new(DeviceTrust::new(
            pool.clone(),
            Arc::clone(&otp),
            Arc::clone(&tokens),
            Arc::clone(&notifier),
        ));
        let presence = Arc::new(PresenceLifecycle::new(pool.clone(), Arc::clone(&store)));

        Self {
            pool,
            config: Arc::new(config),
            store,
            otp,
            tokens,
            devices,
            presence,
            notifier,
        }
    }
}

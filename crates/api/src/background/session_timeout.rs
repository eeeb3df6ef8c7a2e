//! Periodic sweep of abandoned presence sessions.
//!
//! Spawns a background task that closes active sessions whose heartbeat has
//! been silent longer than the timeout. Each swept session is credited up to
//! its last heartbeat, not up to the sweep's run time. Runs on a fixed
//! interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::services::presence::PresenceLifecycle;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300); // 5 minutes

/// Run the session timeout sweep loop.
///
/// Runs until `cancel` is triggered.
pub async fn run(presence: Arc<PresenceLifecycle>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Session timeout sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session timeout sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match presence.sweep_timed_out().await {
                    Ok(closed) => {
                        if closed > 0 {
                            tracing::info!(closed, "Session timeout sweep: closed stale sessions");
                        } else {
                            tracing::debug!("Session timeout sweep: nothing to close");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Session timeout sweep failed");
                    }
                }
            }
        }
    }
}

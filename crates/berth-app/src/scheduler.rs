//! Periodic backups while the gateway runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::gateway::Gateway;

/// Back up every `interval` for as long as the task lives; ticks with no running
/// gateway are skipped. The first backup happens one full interval after spawning.
#[must_use]
pub fn spawn_sync_scheduler(gateway: Arc<Gateway>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(result) = gateway.backup_if_running().await else {
                continue;
            };
            if result.success {
                info!(
                    outcome = result.outcome.as_str(),
                    files = result.files_transferred,
                    "scheduled backup complete"
                );
            } else {
                warn!(
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "scheduled backup failed"
                );
            }
        }
    })
}

//! Session-scoped facade over the supervisor and the sync engine.
//!
//! # Design
//! - `ensure`, `backup`, and `restore` share one async lock, so overlapping callers
//!   queue instead of racing to spawn or interleaving transfers.
//! - Status queries read the marker and process list without taking the lock.

use std::sync::Arc;

use berth_config::BerthConfig;
use berth_sandbox::{SandboxClient, SupervisedProcess};
use berth_store::ObjectStore;
use berth_sync::{RetryPolicy, SyncEngine, SyncResult};
use berth_telemetry::{Metrics, MetricsSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::supervisor::{EnsureOutcome, GatewaySupervisor, SupervisorError};

/// Point-in-time view of the gateway and its backups.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Authoritative gateway process, if one is running.
    pub process: Option<SupervisedProcess>,
    /// Time of the last completed backup.
    pub last_sync: Option<DateTime<Utc>>,
    /// Whether a durable store is configured.
    pub store_configured: bool,
    /// Counter snapshot when metrics are enabled.
    pub metrics: Option<MetricsSnapshot>,
}

/// Gateway supervisor and sync engine behind one session lock.
pub struct Gateway {
    supervisor: GatewaySupervisor,
    sync: Arc<SyncEngine>,
    session: Mutex<()>,
    metrics: Option<Metrics>,
}

impl Gateway {
    /// Combine an already assembled supervisor and engine.
    #[must_use]
    pub fn new(
        supervisor: GatewaySupervisor,
        sync: Arc<SyncEngine>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            supervisor,
            sync,
            session: Mutex::new(()),
            metrics,
        }
    }

    /// Wire supervisor and engine from configuration.
    #[must_use]
    pub fn from_config(
        sandbox: Arc<dyn SandboxClient>,
        store: Option<Arc<dyn ObjectStore>>,
        config: &BerthConfig,
        metrics: Option<Metrics>,
    ) -> Self {
        let mut engine = SyncEngine::new(
            Arc::clone(&sandbox),
            store,
            &config.sync,
            RetryPolicy::from(config.retry),
        );
        let mut supervisor_metrics = None;
        if let Some(metrics) = &metrics {
            engine = engine.with_metrics(metrics.clone());
            supervisor_metrics = Some(metrics.clone());
        }
        let sync = Arc::new(engine);
        let mut supervisor = GatewaySupervisor::new(sandbox, Arc::clone(&sync), &config.gateway);
        if let Some(metrics) = supervisor_metrics {
            supervisor = supervisor.with_metrics(metrics);
        }
        Self::new(supervisor, sync, metrics)
    }

    /// Whether a durable store is configured.
    #[must_use]
    pub fn is_store_configured(&self) -> bool {
        self.sync.is_store_configured()
    }

    /// Find or start the gateway.
    ///
    /// # Errors
    ///
    /// Propagates [`SupervisorError`] from a failed startup.
    pub async fn ensure(&self) -> Result<EnsureOutcome, SupervisorError> {
        let _session = self.session.lock().await;
        self.supervisor.ensure().await
    }

    /// Back up the gateway's state.
    pub async fn backup(&self) -> SyncResult {
        let _session = self.session.lock().await;
        self.sync.backup().await
    }

    /// Restore the gateway's state from the store.
    pub async fn restore(&self) -> SyncResult {
        let _session = self.session.lock().await;
        self.sync.restore().await
    }

    /// Back up only while a gateway process is running; `None` when none is.
    pub async fn backup_if_running(&self) -> Option<SyncResult> {
        let _session = self.session.lock().await;
        if self.supervisor.locate().await.is_none() {
            debug!("no running gateway; backup skipped");
            return None;
        }
        Some(self.sync.backup().await)
    }

    /// Current process, last backup time, and store configuration.
    pub async fn status(&self) -> GatewayStatus {
        let last_sync = if self.sync.is_store_configured() {
            match self.sync.last_sync().await {
                Ok(last_sync) => last_sync,
                Err(err) => {
                    warn!(error = %err, "marker query failed during status");
                    None
                }
            }
        } else {
            None
        };
        GatewayStatus {
            process: self.supervisor.locate().await,
            last_sync,
            store_configured: self.sync.is_store_configured(),
            metrics: self.metrics.as_ref().map(Metrics::snapshot),
        }
    }
}

//! Idempotent, fail-open gateway startup.
//!
//! # Design
//! - A located gateway is reused as-is: no marker query, no restore, no spawn.
//! - Persistence is best-effort: marker query errors read as "no backup" and restore
//!   failures are logged, never fatal.
//! - Every phase transition is logged and recorded in the returned trail.

use std::sync::Arc;
use std::time::Duration;

use berth_config::GatewayConfig;
use berth_sandbox::{
    ProcessLocator, ProcessLogs, ProcessStatus, SandboxClient, SandboxError, SupervisedProcess,
};
use berth_sync::{MarkerState, SyncEngine, SyncError, SyncResult};
use berth_telemetry::Metrics;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Characters of stdout and stderr kept on a startup failure.
pub const LOG_TAIL_CHARS: usize = 4_000;

/// Steps of [`GatewaySupervisor::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsurePhase {
    /// A running gateway was located.
    ExistingProcess,
    /// No gateway was located.
    NoProcess,
    /// A backup existed and a restore ran.
    RestoreAttempted,
    /// No backup existed; restore was skipped.
    RestoreSkipped,
    /// The startup command is being launched.
    Spawning,
    /// Waiting for the service port.
    WaitingForPort,
    /// The gateway is serving.
    Ready,
    /// Startup failed.
    Failed,
}

impl EnsurePhase {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExistingProcess => "existing_process",
            Self::NoProcess => "no_process",
            Self::RestoreAttempted => "restore_attempted",
            Self::RestoreSkipped => "restore_skipped",
            Self::Spawning => "spawning",
            Self::WaitingForPort => "waiting_for_port",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// How the gateway became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsurePath {
    /// An existing process was reused.
    Reused,
    /// A new process was started.
    Started,
}

impl EnsurePath {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Started => "started",
        }
    }
}

/// Successful result of [`GatewaySupervisor::ensure`].
#[derive(Debug, Clone)]
pub struct EnsureOutcome {
    /// Whether the gateway was reused or started.
    pub path: EnsurePath,
    /// The authoritative gateway process.
    pub process: SupervisedProcess,
    /// Phases passed through, in order.
    pub phases: Vec<EnsurePhase>,
    /// Restore result when a restore ran.
    pub restore: Option<SyncResult>,
}

/// Startup failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The startup command could not be launched.
    #[error("gateway spawn failed")]
    Spawn {
        /// Startup command.
        command: String,
        /// Phases passed through before failing.
        phases: Vec<EnsurePhase>,
        /// Underlying sandbox error.
        source: SandboxError,
    },
    /// The gateway did not open its port within the startup timeout.
    #[error("gateway did not become ready")]
    ReadinessTimeout {
        /// Identifier of the spawned process.
        id: String,
        /// Port that was awaited.
        port: u16,
        /// Readiness bound.
        timeout: Duration,
        /// Tail of the process output.
        logs: ProcessLogs,
        /// Phases passed through before failing.
        phases: Vec<EnsurePhase>,
        /// Underlying sandbox error.
        source: SandboxError,
    },
}

#[derive(Debug, Default)]
struct PhaseTrail {
    phases: Vec<EnsurePhase>,
}

impl PhaseTrail {
    fn enter(&mut self, phase: EnsurePhase) {
        let from = self.phases.last().map_or("start", |previous| previous.as_str());
        info!(from, to = phase.as_str(), "gateway ensure phase");
        self.phases.push(phase);
    }
}

/// Finds or starts the gateway inside the sandbox.
pub struct GatewaySupervisor {
    sandbox: Arc<dyn SandboxClient>,
    sync: Arc<SyncEngine>,
    locator: ProcessLocator,
    config: GatewayConfig,
    metrics: Option<Metrics>,
}

impl GatewaySupervisor {
    /// Assemble a supervisor around a sandbox and the sync engine used for restores.
    #[must_use]
    pub fn new(
        sandbox: Arc<dyn SandboxClient>,
        sync: Arc<SyncEngine>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            sandbox,
            sync,
            locator: ProcessLocator::from_config(config),
            config: config.clone(),
            metrics: None,
        }
    }

    /// Count ensure outcomes into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Currently authoritative gateway process, if any.
    pub async fn locate(&self) -> Option<SupervisedProcess> {
        self.locator.find_existing(self.sandbox.as_ref()).await
    }

    /// Make sure exactly one gateway is running, restoring state before a fresh start.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] when the startup command cannot be launched and
    /// [`SupervisorError::ReadinessTimeout`] when the port does not open in time.
    pub async fn ensure(&self) -> Result<EnsureOutcome, SupervisorError> {
        let mut trail = PhaseTrail::default();

        if let Some(process) = self.locate().await {
            trail.enter(EnsurePhase::ExistingProcess);
            trail.enter(EnsurePhase::Ready);
            self.count(EnsurePath::Reused.as_str());
            info!(id = %process.id, status = process.status.as_str(), "reusing running gateway");
            return Ok(EnsureOutcome {
                path: EnsurePath::Reused,
                process,
                phases: trail.phases,
                restore: None,
            });
        }
        trail.enter(EnsurePhase::NoProcess);

        let restore = self.restore_if_backed_up(&mut trail).await;

        trail.enter(EnsurePhase::Spawning);
        let command = self.config.start_command.as_str();
        let mut process = match self.sandbox.spawn(command).await {
            Ok(process) => process,
            Err(source) => {
                trail.enter(EnsurePhase::Failed);
                self.count("failed");
                return Err(SupervisorError::Spawn {
                    command: command.to_string(),
                    phases: trail.phases,
                    source,
                });
            }
        };

        trail.enter(EnsurePhase::WaitingForPort);
        let port = self.config.service_port;
        let timeout = self.config.startup_timeout;
        if let Err(source) = self.sandbox.wait_for_port(&process.id, port, timeout).await {
            trail.enter(EnsurePhase::Failed);
            self.count("failed");
            let logs = match self.sandbox.process_logs(&process.id).await {
                Ok(logs) => logs.tail(LOG_TAIL_CHARS),
                Err(err) => {
                    warn!(id = %process.id, error = %err, "could not fetch gateway logs");
                    ProcessLogs::default()
                }
            };
            warn!(
                id = %process.id,
                port,
                error = %source,
                stdout = %logs.stdout,
                stderr = %logs.stderr,
                "gateway failed to become ready"
            );
            return Err(SupervisorError::ReadinessTimeout {
                id: process.id,
                port,
                timeout,
                logs,
                phases: trail.phases,
                source,
            });
        }

        if process.status == ProcessStatus::Starting
            && let Err(err) = process.transition(ProcessStatus::Running)
        {
            warn!(id = %process.id, error = %err, "could not mark gateway running");
        }
        trail.enter(EnsurePhase::Ready);
        self.count(EnsurePath::Started.as_str());
        info!(id = %process.id, port, "gateway started");
        Ok(EnsureOutcome {
            path: EnsurePath::Started,
            process,
            phases: trail.phases,
            restore,
        })
    }

    async fn restore_if_backed_up(&self, trail: &mut PhaseTrail) -> Option<SyncResult> {
        match self.sync.marker_state().await {
            Ok(MarkerState::Present(last_sync)) => {
                trail.enter(EnsurePhase::RestoreAttempted);
                info!(last_sync = ?last_sync, "backup found; restoring before start");
                let result = self.sync.restore().await;
                if !result.success {
                    warn!(
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "restore failed; starting gateway anyway"
                    );
                }
                Some(result)
            }
            Ok(MarkerState::Absent) => {
                trail.enter(EnsurePhase::RestoreSkipped);
                debug!("no backup marker; skipping restore");
                None
            }
            Err(SyncError::StoreNotConfigured) => {
                trail.enter(EnsurePhase::RestoreSkipped);
                debug!("store not configured; skipping restore");
                None
            }
            Err(err) => {
                trail.enter(EnsurePhase::RestoreSkipped);
                warn!(error = %err, "marker query failed; treating as no backup");
                None
            }
        }
    }

    fn count(&self, path: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_ensure(path);
        }
    }
}

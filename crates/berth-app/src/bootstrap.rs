use std::future::Future;
use std::sync::Arc;

use berth_config::BerthConfig;
use berth_sandbox::{LocalSandbox, SandboxClient};
use berth_store::{FsObjectStore, ObjectStore};
use berth_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha, record_app_mode,
};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::scheduler::spawn_sync_scheduler;

/// Dependencies required to bootstrap the supervisor.
pub(crate) struct BootstrapDependencies {
    config: BerthConfig,
    sandbox: Arc<dyn SandboxClient>,
    store: Option<Arc<dyn ObjectStore>>,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            BerthConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let sandbox: Arc<dyn SandboxClient> =
            Arc::new(LocalSandbox::new(config.sandbox.root.clone()));
        let store = config
            .store
            .dir
            .clone()
            .map(|dir| Arc::new(FsObjectStore::new(dir)) as Arc<dyn ObjectStore>);
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            sandbox,
            store,
            metrics,
        })
    }
}

/// Entry point for the supervisor boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, or gateway startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let logging = LoggingConfig {
        level: &dependencies.config.logging.level,
        format: LogFormat::from_setting(dependencies.config.logging.format.as_deref()),
        build_sha: build_sha(),
    };
    berth_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("supervisor");

    run_app_with(dependencies, wait_for_ctrl_c()).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with<S>(
    dependencies: BootstrapDependencies,
    shutdown: S,
) -> AppResult<()>
where
    S: Future<Output = ()>,
{
    let BootstrapDependencies {
        config,
        sandbox,
        store,
        metrics,
    } = dependencies;
    info!(
        store_configured = store.is_some(),
        roots = config.sync.roots.len(),
        "berth supervisor starting"
    );

    let gateway = Arc::new(Gateway::from_config(
        sandbox,
        store,
        &config,
        Some(metrics.clone()),
    ));
    let outcome = gateway
        .ensure()
        .await
        .map_err(|err| AppError::supervisor("gateway.ensure", err))?;
    info!(
        path = outcome.path.as_str(),
        id = %outcome.process.id,
        phases = ?outcome.phases,
        "gateway available"
    );

    let scheduler = match config.sync.interval {
        Some(interval) if gateway.is_store_configured() => {
            info!(interval_secs = interval.as_secs(), "scheduled backups enabled");
            Some(spawn_sync_scheduler(Arc::clone(&gateway), interval))
        }
        _ => None,
    };

    shutdown.await;
    record_app_mode("shutdown");
    info!("shutdown requested");

    if let Some(handle) = scheduler {
        handle.abort();
        if let Err(err) = handle.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "sync scheduler join failed");
        }
    }

    if gateway.is_store_configured() {
        let result = gateway.backup().await;
        if !result.success {
            warn!(
                error = result.error.as_deref().unwrap_or("unknown"),
                "final backup failed"
            );
        }
    }

    match serde_json::to_string(&metrics.snapshot()) {
        Ok(snapshot) => info!(metrics = %snapshot, "berth supervisor stopped"),
        Err(err) => warn!(error = %err, "could not encode metrics snapshot"),
    }
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c listener failed; shutting down");
    }
}

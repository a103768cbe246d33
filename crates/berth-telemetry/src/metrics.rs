//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the supervisor and sync engine update.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const DIRECTION_BACKUP: &str = "backup";
const DIRECTION_RESTORE: &str = "restore";

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    sync_runs_total: IntCounterVec,
    files_transferred_total: IntCounterVec,
    files_failed_total: IntCounterVec,
    retry_attempts_total: IntCounter,
    ensure_total: IntCounterVec,
    last_backup_timestamp: IntGauge,
}

/// Snapshot of selected counters for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Files uploaded to the store across all backups.
    pub files_backed_up: u64,
    /// Files written back into the sandbox across all restores.
    pub files_restored: u64,
    /// Per-file failures across backups and restores.
    pub files_failed: u64,
    /// Retries triggered by transient sandbox resets.
    pub retry_attempts: u64,
    /// Unix timestamp of the last recorded backup marker, zero when none.
    pub last_backup_timestamp: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let sync_runs_total = counter_vec(
            &registry,
            "sync_runs_total",
            "Backup and restore runs by direction and outcome",
            &["direction", "outcome"],
        )?;
        let files_transferred_total = counter_vec(
            &registry,
            "sync_files_transferred_total",
            "Files transferred by direction",
            &["direction"],
        )?;
        let files_failed_total = counter_vec(
            &registry,
            "sync_files_failed_total",
            "Per-file transfer failures by direction",
            &["direction"],
        )?;
        let ensure_total = counter_vec(
            &registry,
            "gateway_ensure_total",
            "Gateway ensure calls by path",
            &["path"],
        )?;
        let retry_attempts_total = IntCounter::with_opts(Opts::new(
            "sandbox_retry_attempts_total",
            "Operations retried after a transient sandbox reset",
        ))
        .map_err(|source| TelemetryError::MetricsRegister {
            name: "sandbox_retry_attempts_total",
            source,
        })?;
        let last_backup_timestamp = IntGauge::with_opts(Opts::new(
            "sync_last_backup_timestamp_seconds",
            "Unix timestamp of the most recent backup marker",
        ))
        .map_err(|source| TelemetryError::MetricsRegister {
            name: "sync_last_backup_timestamp_seconds",
            source,
        })?;

        register(&registry, "sandbox_retry_attempts_total", &retry_attempts_total)?;
        register(
            &registry,
            "sync_last_backup_timestamp_seconds",
            &last_backup_timestamp,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                sync_runs_total,
                files_transferred_total,
                files_failed_total,
                retry_attempts_total,
                ensure_total,
                last_backup_timestamp,
            }),
        })
    }

    /// Record a completed backup run.
    pub fn record_backup(&self, outcome: &str, transferred: u64, failed: u64) {
        self.record_run(DIRECTION_BACKUP, outcome, transferred, failed);
    }

    /// Record a completed restore run.
    pub fn record_restore(&self, outcome: &str, transferred: u64, failed: u64) {
        self.record_run(DIRECTION_RESTORE, outcome, transferred, failed);
    }

    /// Increment the transient retry counter.
    pub fn inc_retry(&self) {
        self.inner.retry_attempts_total.inc();
    }

    /// Increment the ensure counter for the path taken (`reused`, `started`, `failed`).
    pub fn inc_ensure(&self, path: &str) {
        self.inner.ensure_total.with_label_values(&[path]).inc();
    }

    /// Record the timestamp written into the freshness marker.
    pub fn set_last_backup(&self, unix_seconds: i64) {
        self.inner.last_backup_timestamp.set(unix_seconds);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let transferred = &self.inner.files_transferred_total;
        let failed = &self.inner.files_failed_total;
        MetricsSnapshot {
            files_backed_up: transferred.with_label_values(&[DIRECTION_BACKUP]).get(),
            files_restored: transferred.with_label_values(&[DIRECTION_RESTORE]).get(),
            files_failed: failed.with_label_values(&[DIRECTION_BACKUP]).get()
                + failed.with_label_values(&[DIRECTION_RESTORE]).get(),
            retry_attempts: self.inner.retry_attempts_total.get(),
            last_backup_timestamp: self.inner.last_backup_timestamp.get(),
        }
    }

    fn record_run(&self, direction: &str, outcome: &str, transferred: u64, failed: u64) {
        self.inner
            .sync_runs_total
            .with_label_values(&[direction, outcome])
            .inc();
        self.inner
            .files_transferred_total
            .with_label_values(&[direction])
            .inc_by(transferred);
        self.inner
            .files_failed_total
            .with_label_values(&[direction])
            .inc_by(failed);
    }
}

fn counter_vec(
    registry: &Registry,
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec> {
    let collector = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    register(registry, name, &collector)?;
    Ok(collector)
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.record_backup("success", 3, 0);
        metrics.record_backup("partial_success", 1, 2);
        metrics.record_restore("success", 4, 1);
        metrics.inc_retry();
        metrics.inc_retry();
        metrics.inc_ensure("reused");
        metrics.set_last_backup(1_700_000_000);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                files_backed_up: 4,
                files_restored: 4,
                files_failed: 3,
                retry_attempts: 2,
                last_backup_timestamp: 1_700_000_000,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("sync_runs_total"));
        assert!(rendered.contains("gateway_ensure_total"));
        assert!(rendered.contains("sandbox_retry_attempts_total"));
        Ok(())
    }

    #[test]
    fn fresh_registry_snapshot_is_zeroed() -> Result<()> {
        assert_eq!(Metrics::new()?.snapshot(), MetricsSnapshot::default());
        Ok(())
    }
}

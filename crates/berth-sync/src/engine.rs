//! Backup and restore between the sandbox and the durable store.
//!
//! # Design
//! - Transfers run sequentially; one item's failure is recorded and the run continues.
//! - Sandbox calls go through the retry policy; store calls are made once.
//! - Backups refuse to overwrite an existing backup when the sandbox looks freshly
//!   reset (critical file missing while a marker exists).
//! - The marker is queried at every decision point and never cached.

use std::future::Future;
use std::sync::Arc;

use berth_config::SyncConfig;
use berth_sandbox::{SandboxClient, SandboxErrorKind, SandboxResult};
use berth_store::ObjectStore;
use berth_telemetry::Metrics;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError, describe};
use crate::mapping::PathMapping;
use crate::marker::{FreshnessMarker, MarkerState};
use crate::outcome::{SyncOutcome, SyncResult, TransferError, TransferStage, TransferTally};
use crate::retry::RetryPolicy;

/// Error reported when no durable store is configured.
pub const STORE_NOT_CONFIGURED: &str = "store not configured";

/// Moves files between sandbox backup roots and the durable store.
pub struct SyncEngine {
    sandbox: Arc<dyn SandboxClient>,
    store: Option<Arc<dyn ObjectStore>>,
    mapping: PathMapping,
    marker: FreshnessMarker,
    critical_file: String,
    retry: RetryPolicy,
    metrics: Option<Metrics>,
}

impl SyncEngine {
    /// Assemble an engine; `store` is `None` when no durable store is configured.
    #[must_use]
    pub fn new(
        sandbox: Arc<dyn SandboxClient>,
        store: Option<Arc<dyn ObjectStore>>,
        config: &SyncConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sandbox,
            store,
            mapping: PathMapping::from_config(config),
            marker: FreshnessMarker::new(config.marker_key.clone()),
            critical_file: config.critical_file.clone(),
            retry,
            metrics: None,
        }
    }

    /// Record run outcomes and retries into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a durable store is configured.
    #[must_use]
    pub const fn is_store_configured(&self) -> bool {
        self.store.is_some()
    }

    /// Whether a backup ever completed, read from the store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StoreNotConfigured`] without a store, and store query
    /// errors otherwise.
    pub async fn marker_state(&self) -> Result<MarkerState> {
        let store = self.store.as_deref().ok_or(SyncError::StoreNotConfigured)?;
        self.marker.read(store).await
    }

    /// Timestamp of the last completed backup, when the marker holds a readable one.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::marker_state`].
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.marker_state().await.map(MarkerState::timestamp)
    }

    /// Copy every non-excluded file under each backup root into the store.
    pub async fn backup(&self) -> SyncResult {
        let Some(store) = self.store.as_deref() else {
            warn!("backup skipped: {STORE_NOT_CONFIGURED}");
            return self.finish_backup(SyncResult::refused(STORE_NOT_CONFIGURED, None), 0);
        };

        let previous = match self.marker.read(store).await {
            Ok(previous) => previous,
            Err(err) => {
                warn!(error = %describe(&err), "marker query failed; skipping sanity check");
                MarkerState::Absent
            }
        };
        if previous.is_present()
            && let Some(refused) = self.sanity_check(previous.timestamp()).await
        {
            return self.finish_backup(refused, 0);
        }

        let mut tally = TransferTally::default();
        for root in self.mapping.roots() {
            let source = root.source();
            let files = match self
                .retrying("list_files", || self.sandbox.list_files(source))
                .await
            {
                Ok(files) => files,
                Err(err) if err.kind() == SandboxErrorKind::NotFound => {
                    debug!(root = source, "backup root absent; skipping");
                    continue;
                }
                Err(err) => {
                    let message = describe(&err);
                    warn!(root = source, error = %message, "backup root listing failed; skipping");
                    tally = tally.record_root_error(TransferError::new(
                        source,
                        root.prefix(),
                        TransferStage::List,
                        message,
                    ));
                    continue;
                }
            };
            if files.is_empty() {
                debug!(root = source, "backup root empty");
            }
            for path in files {
                let Some(key) = self.mapping.key_for(&path) else {
                    continue;
                };
                tally = self.upload(store, &path, key, tally).await;
            }
        }

        let outcome = tally.outcome();
        let mut last_sync = previous.timestamp();
        if !outcome.is_failure() {
            let now = Utc::now();
            match self.marker.write(store, now).await {
                Ok(()) => {
                    last_sync = Some(now);
                    if let Some(metrics) = &self.metrics {
                        metrics.set_last_backup(now.timestamp());
                    }
                }
                Err(err) => warn!(error = %describe(&err), "marker write failed"),
            }
        }

        let root_errors = tally.root_errors();
        let result = SyncResult {
            success: !outcome.is_failure(),
            outcome,
            last_sync,
            error: failure_summary(outcome, "backup"),
            details: Some(format!(
                "{} uploaded, {} failed, {} roots unreadable",
                tally.succeeded, tally.failed, root_errors
            )),
            files_transferred: tally.succeeded,
            errors: tally.errors,
        };
        self.finish_backup(result, tally.failed)
    }

    /// Copy every mapped object from the store back into the sandbox.
    pub async fn restore(&self) -> SyncResult {
        let Some(store) = self.store.as_deref() else {
            warn!("restore skipped: {STORE_NOT_CONFIGURED}");
            return self.finish_restore(SyncResult::refused(STORE_NOT_CONFIGURED, None), 0);
        };

        let last_sync = match self.marker.read(store).await {
            Ok(state) => state.timestamp(),
            Err(err) => {
                warn!(error = %describe(&err), "marker query failed during restore");
                None
            }
        };
        let objects = match store.list().await {
            Ok(objects) => objects,
            Err(err) => {
                let message = describe(&err);
                warn!(error = %message, "store listing failed; nothing restored");
                let mut refused = SyncResult::refused("store listing failed", Some(message));
                refused.last_sync = last_sync;
                return self.finish_restore(refused, 0);
            }
        };

        let mut tally = TransferTally::default();
        let mut skipped = 0_usize;
        for object in objects {
            if object.key == self.marker.key() {
                continue;
            }
            let Some(path) = self.mapping.path_for(&object.key) else {
                debug!(key = %object.key, "object outside every backup prefix; skipping");
                skipped += 1;
                continue;
            };
            tally = self.download(store, &object.key, &path, tally).await;
        }

        let success = tally.succeeded > 0;
        let outcome = if success {
            tally.outcome()
        } else {
            SyncOutcome::Failure
        };
        let error = if success {
            failure_summary(outcome, "restore")
        } else if tally.failed == 0 {
            Some("no objects to restore".to_string())
        } else {
            Some("every restore failed".to_string())
        };
        let result = SyncResult {
            success,
            outcome,
            last_sync,
            error,
            details: Some(format!(
                "{} restored, {} failed, {skipped} skipped",
                tally.succeeded, tally.failed
            )),
            files_transferred: tally.succeeded,
            errors: tally.errors,
        };
        self.finish_restore(result, tally.failed)
    }

    async fn sanity_check(&self, previous: Option<DateTime<Utc>>) -> Option<SyncResult> {
        let critical = self.critical_file.as_str();
        match self
            .retrying("file_exists", || self.sandbox.file_exists(critical))
            .await
        {
            Ok(true) => None,
            Ok(false) => {
                let backup = previous.map_or_else(
                    || "an earlier backup".to_string(),
                    |at| format!("a backup from {}", at.to_rfc3339()),
                );
                let details =
                    format!("{critical} is missing but {backup} exists; refusing to overwrite it");
                warn!(
                    critical_file = critical,
                    last_sync = ?previous,
                    "sanity check failed; backup aborted"
                );
                let mut refused = SyncResult::refused("sanity check failed", Some(details));
                refused.last_sync = previous;
                Some(refused)
            }
            Err(err) => {
                warn!(
                    critical_file = critical,
                    error = %describe(&err),
                    "sanity check errored; proceeding"
                );
                None
            }
        }
    }

    async fn upload(
        &self,
        store: &dyn ObjectStore,
        path: &str,
        key: String,
        tally: TransferTally,
    ) -> TransferTally {
        let bytes = match self.retrying("read_file", || self.sandbox.read_file(path)).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let message = describe(&err);
                warn!(path, key = %key, error = %message, "backup read failed");
                return tally.record_failure(TransferError::new(
                    path,
                    key,
                    TransferStage::Read,
                    message,
                ));
            }
        };
        match store.put(&key, bytes).await {
            Ok(()) => tally.record_success(),
            Err(err) => {
                let message = describe(&err);
                warn!(path, key = %key, error = %message, "backup upload failed");
                tally.record_failure(TransferError::new(path, key, TransferStage::Upload, message))
            }
        }
    }

    async fn download(
        &self,
        store: &dyn ObjectStore,
        key: &str,
        path: &str,
        tally: TransferTally,
    ) -> TransferTally {
        let fail = |tally: TransferTally, stage: TransferStage, message: String| {
            warn!(path, key, stage = stage.as_str(), error = %message, "restore failed");
            tally.record_failure(TransferError::new(path, key, stage, message))
        };

        let bytes = match store.get(key).await {
            Ok(Some(object)) => object.into_bytes(),
            Ok(None) => {
                return fail(
                    tally,
                    TransferStage::Download,
                    "object vanished before download".into(),
                );
            }
            Err(err) => return fail(tally, TransferStage::Download, describe(&err)),
        };
        if let Some((parent, _)) = path.rsplit_once('/')
            && !parent.is_empty()
            && let Err(err) = self
                .retrying("create_dir_all", || self.sandbox.create_dir_all(parent))
                .await
        {
            return fail(tally, TransferStage::CreateDir, describe(&err));
        }
        match self
            .retrying("write_file", || self.sandbox.write_file(path, &bytes))
            .await
        {
            Ok(()) => tally.record_success(),
            Err(err) => fail(tally, TransferStage::Write, describe(&err)),
        }
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, op: F) -> SandboxResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SandboxResult<T>>,
    {
        self.retry
            .run_with_hook(operation, op, |_| {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_retry();
                }
            })
            .await
    }

    fn finish_backup(&self, result: SyncResult, failed: usize) -> SyncResult {
        info!(
            outcome = result.outcome.as_str(),
            transferred = result.files_transferred,
            failed,
            error = result.error.as_deref().unwrap_or(""),
            "backup finished"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_backup(
                result.outcome.as_str(),
                result.files_transferred as u64,
                failed as u64,
            );
        }
        result
    }

    fn finish_restore(&self, result: SyncResult, failed: usize) -> SyncResult {
        info!(
            outcome = result.outcome.as_str(),
            transferred = result.files_transferred,
            failed,
            error = result.error.as_deref().unwrap_or(""),
            "restore finished"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_restore(
                result.outcome.as_str(),
                result.files_transferred as u64,
                failed as u64,
            );
        }
        result
    }
}

fn failure_summary(outcome: SyncOutcome, direction: &str) -> Option<String> {
    match outcome {
        SyncOutcome::Success => None,
        SyncOutcome::PartialSuccess { failed, .. } => {
            Some(format!("{direction} incomplete: {failed} failures"))
        }
        SyncOutcome::Failure => Some(format!("every {direction} transfer failed")),
    }
}

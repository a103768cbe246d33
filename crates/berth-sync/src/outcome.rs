//! Per-item transfer tallies and the structured result of a sync run.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Three-way classification of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing failed, including runs with nothing to transfer.
    Success,
    /// Some items failed alongside successes, or whole roots could not be listed.
    PartialSuccess {
        /// Items transferred.
        succeeded: usize,
        /// Items and roots that failed.
        failed: usize,
    },
    /// Transfers were attempted and every one failed, or the run was refused.
    Failure,
}

impl SyncOutcome {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess { .. } => "partial_success",
            Self::Failure => "failure",
        }
    }

    /// Whether the run counts as failed.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// Step at which a single transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    /// Listing a backup root.
    List,
    /// Reading a sandbox file.
    Read,
    /// Writing an object to the store.
    Upload,
    /// Fetching an object from the store.
    Download,
    /// Creating the parent directory in the sandbox.
    CreateDir,
    /// Writing a sandbox file.
    Write,
}

impl TransferStage {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::CreateDir => "create_dir",
            Self::Write => "write",
        }
    }
}

/// One failed transfer, or one root that could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferError {
    /// Sandbox path (a root's source directory for listing failures).
    pub path: String,
    /// Object key (a root's prefix for listing failures).
    pub key: String,
    /// Step that failed.
    pub stage: TransferStage,
    /// Rendered error chain.
    pub message: String,
}

impl TransferError {
    /// Describe a failed step.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        key: impl Into<String>,
        stage: TransferStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            stage,
            message: message.into(),
        }
    }
}

/// Immutable fold over per-item results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferTally {
    /// Items transferred.
    pub succeeded: usize,
    /// Items that failed (root listing failures are not counted here).
    pub failed: usize,
    /// Every failure, including root listing failures.
    pub errors: Vec<TransferError>,
}

impl TransferTally {
    /// Fold in one successful transfer.
    #[must_use]
    pub fn record_success(self) -> Self {
        Self {
            succeeded: self.succeeded + 1,
            ..self
        }
    }

    /// Fold in one failed transfer.
    #[must_use]
    pub fn record_failure(mut self, error: TransferError) -> Self {
        self.errors.push(error);
        Self {
            failed: self.failed + 1,
            ..self
        }
    }

    /// Fold in a root that could not be listed.
    #[must_use]
    pub fn record_root_error(mut self, error: TransferError) -> Self {
        self.errors.push(error);
        self
    }

    /// Roots that could not be listed.
    #[must_use]
    pub fn root_errors(&self) -> usize {
        self.errors
            .iter()
            .filter(|error| error.stage == TransferStage::List)
            .count()
    }

    /// Classify the run.
    #[must_use]
    pub fn outcome(&self) -> SyncOutcome {
        let root_errors = self.root_errors();
        if self.failed == 0 && root_errors == 0 {
            SyncOutcome::Success
        } else if self.succeeded == 0 && self.failed > 0 {
            SyncOutcome::Failure
        } else {
            SyncOutcome::PartialSuccess {
                succeeded: self.succeeded,
                failed: self.failed + root_errors,
            }
        }
    }
}

/// Structured result of a backup or restore; produced per call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Overall success flag.
    pub success: bool,
    /// Three-way classification.
    pub outcome: SyncOutcome,
    /// Marker timestamp after the run (backup) or the one restored from (restore).
    pub last_sync: Option<DateTime<Utc>>,
    /// Short description of why the run failed or was incomplete.
    pub error: Option<String>,
    /// Human-readable summary.
    pub details: Option<String>,
    /// Items transferred.
    pub files_transferred: usize,
    /// Per-item and per-root failures.
    pub errors: Vec<TransferError>,
}

impl SyncResult {
    /// A refused run that transferred nothing.
    #[must_use]
    pub fn refused(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            outcome: SyncOutcome::Failure,
            last_sync: None,
            error: Some(error.into()),
            details,
            files_transferred: 0,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(path: &str, stage: TransferStage) -> TransferError {
        TransferError::new(path, "config/x", stage, "sandbox io failure")
    }

    #[test]
    fn empty_tally_is_vacuous_success() {
        assert_eq!(TransferTally::default().outcome(), SyncOutcome::Success);
    }

    #[test]
    fn mixed_results_are_partial() {
        let tally = TransferTally::default()
            .record_success()
            .record_failure(failure("/data/config/a", TransferStage::Read))
            .record_success();
        assert_eq!(
            tally.outcome(),
            SyncOutcome::PartialSuccess {
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(tally.errors.len(), 1);
    }

    #[test]
    fn all_attempted_failing_is_failure_even_with_root_errors() {
        let tally = TransferTally::default()
            .record_root_error(failure("/data/skills/", TransferStage::List))
            .record_failure(failure("/data/config/a", TransferStage::Upload));
        assert_eq!(tally.outcome(), SyncOutcome::Failure);
    }

    #[test]
    fn root_errors_without_attempts_are_partial() {
        let tally = TransferTally::default()
            .record_root_error(failure("/data/skills/", TransferStage::List));
        assert_eq!(tally.failed, 0);
        assert_eq!(
            tally.outcome(),
            SyncOutcome::PartialSuccess {
                succeeded: 0,
                failed: 1
            }
        );
    }

    #[test]
    fn outcome_serializes_with_kind_tag() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(SyncOutcome::PartialSuccess {
            succeeded: 3,
            failed: 1,
        })?;
        assert_eq!(
            json,
            serde_json::json!({"kind": "partial_success", "succeeded": 3, "failed": 1})
        );
        Ok(())
    }
}

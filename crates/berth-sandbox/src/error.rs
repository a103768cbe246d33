//! # Design
//!
//! - Every sandbox failure carries a machine-readable [`SandboxErrorKind`] so retry
//!   policy never depends on message text.
//! - Messages stay constant; operation, path, and command travel as context fields.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::model::ProcessStatus;

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Coarse classification of sandbox failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorKind {
    /// The execution environment was reset mid-operation and the call may be retried.
    TransientReset,
    /// The operation exceeded its time bound.
    Timeout,
    /// The addressed file, directory, or process does not exist.
    NotFound,
    /// The request itself was invalid.
    InvalidInput,
    /// Any other failure.
    Failed,
}

/// Errors produced by sandbox collaborators.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The execution environment restarted while the operation was in flight.
    #[error("sandbox execution environment reset")]
    TransientReset {
        /// Operation that was interrupted.
        operation: &'static str,
        /// Transport-provided detail.
        detail: String,
    },
    /// The operation exceeded its time bound.
    #[error("sandbox operation timed out")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Time bound that elapsed.
        after: Duration,
    },
    /// A sandbox path did not exist.
    #[error("sandbox path not found")]
    NotFound {
        /// Operation that triggered the lookup.
        operation: &'static str,
        /// Sandbox path that was missing.
        path: String,
    },
    /// A sandbox path was malformed or escaped the sandbox root.
    #[error("invalid sandbox path")]
    InvalidPath {
        /// Offending sandbox path.
        path: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// Filesystem IO failed inside the sandbox.
    #[error("sandbox io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Sandbox path involved in the failure.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Launching a process failed.
    #[error("sandbox process spawn failed")]
    Spawn {
        /// Command that failed to launch.
        command: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A process identifier was not known to the sandbox.
    #[error("sandbox process not found")]
    UnknownProcess {
        /// Identifier that was not found.
        id: String,
    },
    /// A process exited before its port became ready.
    #[error("sandbox process exited before becoming ready")]
    ProcessExited {
        /// Identifier of the exited process.
        id: String,
        /// Exit code when available.
        exit_code: Option<i32>,
    },
    /// A status change would move a process backwards or out of a terminal state.
    #[error("invalid process status transition")]
    InvalidTransition {
        /// Identifier of the process.
        id: String,
        /// Current status.
        from: ProcessStatus,
        /// Requested status.
        to: ProcessStatus,
    },
}

impl SandboxError {
    /// Classify the failure.
    #[must_use]
    pub const fn kind(&self) -> SandboxErrorKind {
        match self {
            Self::TransientReset { .. } => SandboxErrorKind::TransientReset,
            Self::Timeout { .. } => SandboxErrorKind::Timeout,
            Self::NotFound { .. } | Self::UnknownProcess { .. } => SandboxErrorKind::NotFound,
            Self::InvalidPath { .. } | Self::InvalidTransition { .. } => {
                SandboxErrorKind::InvalidInput
            }
            Self::Io { .. } | Self::Spawn { .. } | Self::ProcessExited { .. } => {
                SandboxErrorKind::Failed
            }
        }
    }

    /// Whether the failure is a transient reset worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), SandboxErrorKind::TransientReset)
    }

    /// Map an IO error raised while touching `path`, tagging resets and missing paths.
    pub(crate) fn from_io(operation: &'static str, path: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                operation,
                path: path.to_string(),
            },
            io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::TransientReset {
                operation,
                detail: source.to_string(),
            },
            _ => Self::Io {
                operation,
                path: path.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_tagged_by_kind() {
        let missing = SandboxError::from_io(
            "read_file",
            "/data/x",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(missing.kind(), SandboxErrorKind::NotFound);

        let reset = SandboxError::from_io(
            "read_file",
            "/data/x",
            io::Error::from(io::ErrorKind::ConnectionReset),
        );
        assert!(reset.is_transient());

        let denied = SandboxError::from_io(
            "read_file",
            "/data/x",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(denied.kind(), SandboxErrorKind::Failed);
        assert!(!denied.is_transient());
    }

    #[test]
    fn only_resets_are_transient() {
        let timeout = SandboxError::Timeout {
            operation: "list_processes",
            after: Duration::from_secs(10),
        };
        assert!(!timeout.is_transient());
        let reset = SandboxError::TransientReset {
            operation: "list_files",
            detail: "container restarted".into(),
        };
        assert!(reset.is_transient());
        assert_eq!(reset.to_string(), "sandbox execution environment reset");
    }
}

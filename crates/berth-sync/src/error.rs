//! # Design
//!
//! - Wraps collaborator errors with the operation and the path or key involved.
//! - Backup and restore never surface these to callers; they are folded into
//!   [`crate::SyncResult`]. Marker and status queries return them directly.

use std::error::Error as StdError;

use berth_store::StoreError;
use thiserror::Error;

/// Result alias for sync helpers that can fail.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors produced outside the structured backup/restore results.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No durable store is configured.
    #[error("store not configured")]
    StoreNotConfigured,
    /// A store call failed.
    #[error("sync store failure")]
    Store {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Object key involved.
        key: String,
        /// Underlying store error.
        source: StoreError,
    },
}

/// Render an error and its source chain on one line.
pub(crate) fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn describe_walks_the_source_chain() {
        let err = SyncError::Store {
            operation: "put",
            key: "config/x.json".into(),
            source: StoreError::Io {
                operation: "put.write",
                path: "/store/config/x.json".into(),
                source: io::Error::other("disk full"),
            },
        };
        assert_eq!(
            describe(&err),
            "sync store failure: object store io failure: disk full"
        );
    }
}

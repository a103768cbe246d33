//! # Design
//!
//! - Constant messages; the key and operation travel as fields.
//! - Store failures are never classified as transient sandbox resets.

use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by object store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key cannot name an object.
    #[error("invalid object key")]
    InvalidKey {
        /// Offending key.
        key: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// Backend IO failed.
    #[error("object store io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Backend path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Object contents were not valid UTF-8 when read as text.
    #[error("object is not valid utf-8")]
    Decode {
        /// Key of the object.
        key: String,
        /// Underlying decode error.
        source: FromUtf8Error,
    },
    /// The backend refused or could not serve the request.
    #[error("object store unavailable")]
    Unavailable {
        /// Operation that was refused.
        operation: &'static str,
        /// Backend-provided detail.
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_stay_constant() {
        let err = StoreError::io(
            "put",
            "/var/lib/berth/config/x.json",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.to_string(), "object store io failure");
        let err = StoreError::InvalidKey {
            key: "../x".into(),
            reason: "parent_segment",
        };
        assert_eq!(err.to_string(), "invalid object key");
    }
}

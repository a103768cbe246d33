//! Error types for configuration loading.
//!
//! # Design
//! - Constant error messages; the offending field and value travel as context.
//! - Field names are the environment variable names so operators can act on them directly.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field (environment variable) that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Two backup roots claim prefixes that would make the key mapping ambiguous.
    #[error("overlapping backup prefixes")]
    OverlappingPrefixes {
        /// First prefix involved in the overlap.
        first: String,
        /// Second prefix involved in the overlap.
        second: String,
    },
    /// Two backup roots share overlapping source directories.
    #[error("overlapping backup sources")]
    OverlappingSources {
        /// First source directory involved in the overlap.
        first: String,
        /// Second source directory involved in the overlap.
        second: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_helper_captures_value() {
        let err = ConfigError::invalid("BERTH_SERVICE_PORT", "not_a_number", "abc");
        assert_eq!(
            err,
            ConfigError::InvalidField {
                field: "BERTH_SERVICE_PORT",
                reason: "not_a_number",
                value: Some("abc".to_string()),
            }
        );
        assert_eq!(err.to_string(), "invalid configuration field");
    }
}

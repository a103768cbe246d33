//! # Design
//!
//! - Centralize application-level errors for bootstrap and supervision.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

use crate::supervisor::SupervisorError;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: berth_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: berth_telemetry::TelemetryError,
    },
    /// The gateway could not be brought up.
    #[error("gateway supervision failed")]
    Supervisor {
        /// Operation identifier.
        operation: &'static str,
        /// Source supervisor error.
        source: SupervisorError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: berth_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: berth_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn supervisor(operation: &'static str, source: SupervisorError) -> Self {
        Self::Supervisor { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.from_env",
            berth_config::ConfigError::InvalidField {
                field: "service_port",
                reason: "zero",
                value: Some("0".into()),
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.from_env",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());
    }
}

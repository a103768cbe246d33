//! Typed configuration sections.
//!
//! # Design
//! - Pure data carriers consumed by the sandbox, sync, and app crates.
//! - Sandbox paths stay as `String`: they name locations inside the sandbox, not on the host.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BerthConfig {
    /// Durable object store settings.
    pub store: StoreConfig,
    /// Local sandbox settings.
    pub sandbox: SandboxConfig,
    /// Backup and restore settings.
    pub sync: SyncConfig,
    /// Supervised gateway settings.
    pub gateway: GatewayConfig,
    /// Retry policy for transient sandbox resets.
    pub retry: RetryConfig,
    /// Logging settings.
    pub logging: LogSettings,
}

/// Durable object store location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory backing the store; `None` means the store is not configured.
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Whether a durable store has been configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.dir.is_some()
    }
}

/// Settings for the local sandbox implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Host directory that sandbox-absolute paths are resolved against.
    pub root: PathBuf,
}

/// A source directory mirrored under a fixed object-key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRootConfig {
    /// Absolute sandbox directory, always ending in `/`.
    pub source: String,
    /// Object-key prefix, always ending in `/`.
    pub prefix: String,
}

/// Backup and restore settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directories mirrored into the store.
    pub roots: Vec<BackupRootConfig>,
    /// File suffixes invisible to backup and restore.
    pub exclude_suffixes: Vec<String>,
    /// Store key holding the freshness marker.
    pub marker_key: String,
    /// Sandbox file that must exist before overwriting an existing backup.
    pub critical_file: String,
    /// Interval between scheduled backups; `None` disables scheduling.
    pub interval: Option<Duration>,
}

/// Supervised gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Startup command used when spawning the gateway.
    pub start_command: String,
    /// Command fragments that identify a gateway process.
    pub start_signatures: Vec<String>,
    /// Command fragments that identify one-off utility invocations to ignore.
    pub utility_signatures: Vec<String>,
    /// Port the gateway reports ready on.
    pub service_port: u16,
    /// Upper bound on the readiness wait.
    pub startup_timeout: Duration,
}

/// Retry policy for operations interrupted by sandbox resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_ATTEMPTS,
            delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
        }
    }
}

/// Logging settings forwarded to the telemetry crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default level when `RUST_LOG` is absent.
    pub level: String,
    /// Explicit output format (`json` or `pretty`); inferred from the build when absent.
    pub format: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

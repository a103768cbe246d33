//! Sample configuration matching the shipped defaults.

use std::time::Duration;

use berth_config::{BackupRootConfig, GatewayConfig, RetryConfig, SyncConfig, defaults};

/// Critical file checked before overwriting an existing backup.
pub const CRITICAL_FILE: &str = defaults::CRITICAL_FILE;

/// Default backup roots: `/data/config/` as `config/`, `/data/skills/` as `skills/`.
#[must_use]
pub fn backup_roots() -> Vec<BackupRootConfig> {
    vec![
        BackupRootConfig {
            source: "/data/config/".into(),
            prefix: "config/".into(),
        },
        BackupRootConfig {
            source: "/data/skills/".into(),
            prefix: "skills/".into(),
        },
    ]
}

/// Sync settings with the default roots, exclusions, and marker; scheduling disabled.
#[must_use]
pub fn sync_config() -> SyncConfig {
    SyncConfig {
        roots: backup_roots(),
        exclude_suffixes: vec![".lock".into(), ".log".into(), ".tmp".into()],
        marker_key: defaults::MARKER_KEY.into(),
        critical_file: CRITICAL_FILE.into(),
        interval: None,
    }
}

/// Gateway settings with the default signatures and a short readiness timeout.
#[must_use]
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        start_command: defaults::START_COMMAND.into(),
        start_signatures: vec!["start-gateway.sh".into(), "gateway run".into()],
        utility_signatures: vec!["gateway devices".into(), "gateway --version".into()],
        service_port: defaults::SERVICE_PORT,
        startup_timeout: Duration::from_secs(5),
    }
}

/// Retry settings with the shipped attempt count and delay.
#[must_use]
pub fn retry_config() -> RetryConfig {
    RetryConfig::default()
}

//! Baseline configuration values.
//!
//! # Design
//! - Centralize defaults so the loader, docs, and tests agree on one set of values.
//! - Keep durations as plain integers; the loader converts them.

/// Key holding the freshness marker timestamp.
pub const MARKER_KEY: &str = ".last-sync";
/// Backup roots as `source=prefix` pairs.
pub const BACKUP_ROOTS: &str = "/data/config/=config/,/data/skills/=skills/";
/// File suffixes never mirrored to the store.
pub const EXCLUDE_SUFFIXES: &str = ".lock,.log,.tmp";
/// File whose absence blocks a backup once a marker exists.
pub const CRITICAL_FILE: &str = "/data/config/gateway.json";
/// Command used to launch the supervised gateway.
pub const START_COMMAND: &str = "/usr/local/bin/start-gateway.sh";
/// Command fragments identifying a gateway process.
pub const START_SIGNATURES: &str = "start-gateway.sh,gateway run";
/// Command fragments identifying one-off utility invocations.
pub const UTILITY_SIGNATURES: &str = "gateway devices,gateway --version";
/// Port the gateway listens on once ready.
pub const SERVICE_PORT: u16 = 18_789;
/// Upper bound on the readiness wait after spawning.
pub const STARTUP_TIMEOUT_SECS: u64 = 180;
/// Maximum attempts for operations hit by transient sandbox resets.
pub const RETRY_ATTEMPTS: u32 = 5;
/// Fixed delay between retry attempts.
pub const RETRY_DELAY_MS: u64 = 3_000;
/// Interval between scheduled backups; zero disables the scheduler.
pub const SYNC_INTERVAL_SECS: u64 = 300;
/// Root directory the local sandbox maps sandbox paths onto.
pub const SANDBOX_ROOT: &str = "/";
/// Default log level when `RUST_LOG` is absent.
pub const LOG_LEVEL: &str = "info";

#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-driven configuration for the Berth supervisor.
//!
//! Layout: `model.rs` (typed config sections), `defaults.rs` (baseline values),
//! `loader.rs` (environment parsing), `validate.rs` (cross-field checks).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    BackupRootConfig, BerthConfig, GatewayConfig, LogSettings, RetryConfig, SandboxConfig,
    StoreConfig, SyncConfig,
};

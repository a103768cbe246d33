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
#![allow(clippy::module_name_repetitions)]

//! Berth application wiring.
//!
//! Layout: `supervisor.rs` (gateway ensure), `gateway.rs` (session-locked facade),
//! `scheduler.rs` (periodic backups), `bootstrap.rs` (environment wiring and shutdown),
//! `error.rs` (application errors).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;
/// Session-locked facade over the supervisor and sync engine.
pub mod gateway;
/// Periodic backup task.
pub mod scheduler;
/// Gateway discovery and startup.
pub mod supervisor;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use gateway::{Gateway, GatewayStatus};
pub use scheduler::spawn_sync_scheduler;
pub use supervisor::{EnsureOutcome, EnsurePath, EnsurePhase, GatewaySupervisor, SupervisorError};

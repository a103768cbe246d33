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

//! Sandbox collaborator surface: process control, file access, and gateway discovery.
//!
//! Layout: `model.rs` (process records), `client.rs` (`SandboxClient` trait),
//! `local.rs` (host-backed implementation), `locator.rs` (existing-process discovery),
//! `error.rs` (tagged sandbox errors).

pub mod client;
pub mod error;
pub mod local;
pub mod locator;
pub mod model;

pub use client::SandboxClient;
pub use error::{SandboxError, SandboxErrorKind, SandboxResult};
pub use local::LocalSandbox;
pub use locator::ProcessLocator;
pub use model::{ProcessLogs, ProcessStatus, SupervisedProcess};

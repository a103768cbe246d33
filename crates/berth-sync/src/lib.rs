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

//! Bidirectional sync between sandbox directories and the durable object store.
//!
//! Layout: `engine.rs` (backup/restore), `mapping.rs` (path and key translation),
//! `outcome.rs` (per-item tallies and results), `marker.rs` (freshness marker),
//! `retry.rs` (transient-reset retry policy), `error.rs`.

pub mod engine;
pub mod error;
pub mod mapping;
pub mod marker;
pub mod outcome;
pub mod retry;

pub use engine::{STORE_NOT_CONFIGURED, SyncEngine};
pub use error::SyncError;
pub use mapping::{BackupRoot, ExclusionRule, PathMapping};
pub use marker::{FreshnessMarker, MarkerState};
pub use outcome::{SyncOutcome, SyncResult, TransferError, TransferStage, TransferTally};
pub use retry::{RetryPolicy, TransientClassify};

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

//! Durable object store collaborator.
//!
//! Layout: `store.rs` (`ObjectStore` trait), `model.rs` (objects and listings),
//! `fs.rs` (directory-backed store), `memory.rs` (in-process store), `error.rs`.

pub mod error;
pub mod fs;
pub mod memory;
pub mod model;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use model::{ObjectMeta, StoredObject};
pub use store::{ObjectStore, validate_key};

//! Object store trait and key rules shared by every backend.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::model::{ObjectMeta, StoredObject};

/// Key-addressed durable blob storage.
///
/// Keys are relative, `/`-separated names such as `config/x.json`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;

    /// Fetch the object under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// List every object, sorted by key.
    async fn list(&self) -> StoreResult<Vec<ObjectMeta>>;
}

/// Check that `key` is a relative, normalized object key.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for empty keys, absolute keys, trailing slashes,
/// and empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let reject = |reason| {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return reject("empty");
    }
    if key.starts_with('/') {
        return reject("absolute");
    }
    if key.ends_with('/') {
        return reject("trailing_slash");
    }
    for segment in key.split('/') {
        match segment {
            "" => return reject("empty_segment"),
            "." | ".." => return reject("relative_segment"),
            _ => {}
        }
    }
    Ok(())
}

//! In-process object store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::error;

use crate::error::StoreResult;
use crate::model::{ObjectMeta, StoredObject};
use crate::store::{ObjectStore, validate_key};

/// Object store held in memory; clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("memory store mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        validate_key(key)?;
        self.objects().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(key)?;
        Ok(self
            .objects()
            .get(key)
            .map(|bytes| StoredObject::new(key, bytes.clone())))
    }

    async fn list(&self) -> StoreResult<Vec<ObjectMeta>> {
        Ok(self
            .objects()
            .iter()
            .map(|(key, bytes)| ObjectMeta {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_objects() -> StoreResult<()> {
        let store = MemoryObjectStore::new();
        let view = store.clone();
        store.put("config/a.json", b"{}".to_vec()).await?;

        assert_eq!(view.keys(), vec!["config/a.json".to_string()]);
        let listed = view.list().await?;
        assert_eq!(listed[0].size, 2);
        assert!(view.get("config/b.json").await?.is_none());
        Ok(())
    }
}

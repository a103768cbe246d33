//! Directory-backed object store.
//!
//! # Design
//! - Keys map one-to-one onto relative paths below the store directory.
//! - Writes land in a sibling partial file and are renamed into place, so readers never
//!   observe a torn object.
//! - A missing store directory lists as empty; it is created on first write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::model::{ObjectMeta, StoredObject};
use crate::store::{ObjectStore, validate_key};

const PARTIAL_SUFFIX: &str = ".berth-partial";

/// Object store persisting each object as a file below a directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        if key.ends_with(PARTIAL_SUFFIX) {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "reserved_suffix",
            });
        }
        let mut path = self.dir.clone();
        path.extend(key.split('/'));
        Ok(path)
    }

    fn walk(dir: &Path) -> StoreResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                StoreError::io("list", path, source)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|err| {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                    StoreError::io("list.metadata", entry.path(), source)
                })?
                .len();
            objects.push(ObjectMeta { key, size });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::io("put.create_dir", parent, source))?;
        }
        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|source| StoreError::io("put.write", &partial, source))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|source| StoreError::io("put.rename", &path, source))?;
        debug!(key, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject::new(key, bytes))),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::io("get", path, source)),
        }
    }

    async fn list(&self) -> StoreResult<Vec<ObjectMeta>> {
        let dir = self.dir.clone();
        match tokio::fs::metadata(&dir).await {
            Ok(_) => {}
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::io("list", dir, source)),
        }
        tokio::task::spawn_blocking(move || Self::walk(&dir))
            .await
            .map_err(|err| StoreError::Unavailable {
                operation: "list",
                detail: err.to_string(),
            })?
    }
}

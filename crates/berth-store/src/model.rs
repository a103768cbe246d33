//! Objects and listings returned by stores.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
}

/// An object fetched from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    key: String,
    bytes: Vec<u8>,
}

impl StoredObject {
    /// Wrap fetched bytes.
    #[must_use]
    pub fn new(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            bytes,
        }
    }

    /// Key the object was fetched from.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the object, returning its contents.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Contents decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] when the contents are not valid UTF-8.
    pub fn text(&self) -> StoreResult<String> {
        String::from_utf8(self.bytes.clone()).map_err(|source| StoreError::Decode {
            key: self.key.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_decodes_utf8_and_rejects_binary() {
        let object = StoredObject::new(".last-sync", b"2024-01-01T00:00:00Z".to_vec());
        assert_eq!(object.text().ok().as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(object.key(), ".last-sync");

        let binary = StoredObject::new("skills/blob.bin", vec![0xff, 0xfe]);
        assert!(matches!(binary.text(), Err(StoreError::Decode { .. })));
        assert_eq!(binary.into_bytes(), vec![0xff, 0xfe]);
    }
}

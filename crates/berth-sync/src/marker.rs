//! Freshness marker: one store key holding the time of the last completed backup.

use berth_store::ObjectStore;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// What the marker key held when it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// No backup ever completed.
    Absent,
    /// A backup completed; the time is `None` when the stored value is unreadable.
    Present(Option<DateTime<Utc>>),
}

impl MarkerState {
    /// Whether a backup ever completed.
    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Time of the last completed backup, when known.
    #[must_use]
    pub const fn timestamp(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Present(at) => at,
            Self::Absent => None,
        }
    }
}

/// Reads and writes the freshness marker key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessMarker {
    key: String,
}

impl FreshnessMarker {
    /// Marker stored under `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Store key of the marker.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a backup ever completed, and when.
    ///
    /// A key that exists but does not hold a UTF-8 RFC 3339 timestamp still reads as
    /// [`MarkerState::Present`]; only a missing key is [`MarkerState::Absent`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the store cannot be queried.
    pub async fn read(&self, store: &dyn ObjectStore) -> Result<MarkerState> {
        let object = store
            .get(&self.key)
            .await
            .map_err(|source| self.store_error("marker.get", source))?;
        let Some(object) = object else {
            return Ok(MarkerState::Absent);
        };
        let text = match object.text() {
            Ok(text) => text,
            Err(err) => {
                warn!(key = %self.key, error = %err, "freshness marker is not utf-8");
                return Ok(MarkerState::Present(None));
            }
        };
        let value = text.trim();
        match DateTime::parse_from_rfc3339(value) {
            Ok(at) => Ok(MarkerState::Present(Some(at.with_timezone(&Utc)))),
            Err(err) => {
                warn!(key = %self.key, value, error = %err, "freshness marker is not a timestamp");
                Ok(MarkerState::Present(None))
            }
        }
    }

    /// Record `at` as the time of the last completed backup.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the write fails.
    pub async fn write(&self, store: &dyn ObjectStore, at: DateTime<Utc>) -> Result<()> {
        let value = at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        store
            .put(&self.key, value.clone().into_bytes())
            .await
            .map_err(|source| self.store_error("marker.put", source))?;
        debug!(key = %self.key, value = %value, "freshness marker written");
        Ok(())
    }

    fn store_error(&self, operation: &'static str, source: berth_store::StoreError) -> SyncError {
        SyncError::Store {
            operation,
            key: self.key.clone(),
            source,
        }
    }
}

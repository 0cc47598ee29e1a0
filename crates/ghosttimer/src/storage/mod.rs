//! Persistent key-value storage for recorded samples.
//!
//! The layout follows a browser's local storage: string keys, UTF-8 text
//! values, and a typed adapter on top that owns JSON (de)serialization.
//!
//! - [`StorageBackend`] is the raw text capability (`SQLite` file or memory).
//! - [`KeyValueStore`] adds typed `get`/`set`/`remove` and the availability
//!   probe.
//! - [`SampleLog`] is the single slot holding the recorded session.

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::sample::PositionSample;

pub use memory::MemoryBackend;
pub use sqlite::{SqliteBackend, StorageStats};

/// Key used by the availability probe.
pub const PROBE_KEY: &str = "__storage_test__";

/// Key under which the recorded session is stored.
pub const DEFAULT_SAMPLE_KEY: &str = "_position_";

/// Raw text storage keyed by string.
pub trait StorageBackend: Send + std::fmt::Debug {
    /// Read the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or would exceed the quota.
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

/// Typed JSON adapter over a [`StorageBackend`].
#[derive(Debug)]
pub struct KeyValueStore {
    backend: Box<dyn StorageBackend>,
}

impl KeyValueStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Read and deserialize the value at `key`.
    ///
    /// Unset keys, unreadable backends and values that don't parse as `T`
    /// all come back as `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.backend.get_item(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from store");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Stored value is malformed, treating as absent");
                None
            }
        }
    }

    /// Serialize and write `value` at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.backend.set_item(key, &text)
    }

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.backend.remove_item(key)
    }

    /// Probe whether the store accepts writes.
    ///
    /// Writes and removes [`PROBE_KEY`]. Any failure, quota or otherwise,
    /// reports the store as unavailable.
    pub fn is_available(&mut self) -> bool {
        let probe = self
            .backend
            .set_item(PROBE_KEY, PROBE_KEY)
            .and_then(|()| self.backend.remove_item(PROBE_KEY));

        match probe {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    error = %e,
                    quota = e.is_quota_exceeded(),
                    "Storage availability probe failed"
                );
                false
            }
        }
    }
}

/// The recorded session: an array of samples in one store slot.
#[derive(Debug)]
pub struct SampleLog {
    store: KeyValueStore,
    key: String,
}

impl SampleLog {
    /// Use `key` in `store` as the session slot.
    #[must_use]
    pub fn new(store: KeyValueStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The slot key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All recorded samples, or an empty list if none are stored.
    #[must_use]
    pub fn load(&self) -> Vec<PositionSample> {
        self.store.get(&self.key).unwrap_or_default()
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.load().len()
    }

    /// Append a sample, creating the array if absent.
    ///
    /// Returns the number of samples now stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated array cannot be written.
    pub fn append(&mut self, sample: PositionSample) -> Result<usize> {
        let mut samples = self.load();
        samples.push(sample);
        self.store.set(&self.key, &samples)?;
        Ok(samples.len())
    }

    /// Delete every recorded sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed.
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(&self.key)
    }

    /// Probe whether the underlying store accepts writes.
    pub fn is_available(&mut self) -> bool {
        self.store.is_available()
    }
}

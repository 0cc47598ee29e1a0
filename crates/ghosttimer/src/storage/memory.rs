//! In-memory backend, used by tests and dry runs.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::StorageBackend;

/// A `HashMap`-backed store with an optional byte quota.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    items: HashMap<String, String>,
    quota_bytes: u64,
    fail_writes: bool,
}

impl MemoryBackend {
    /// Create an empty, unlimited store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a byte quota.
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes,
            ..Self::default()
        }
    }

    /// Make every write fail, simulating a store that has gone read-only.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn bytes_used_excluding(&self, excluding: &str) -> u64 {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != excluding)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Error::StorageUnavailable);
        }
        if self.quota_bytes > 0 {
            let needed = self.bytes_used_excluding(key) + (key.len() + value.len()) as u64;
            if needed > self.quota_bytes {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota: self.quota_bytes,
                });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

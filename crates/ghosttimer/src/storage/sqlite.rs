//! `SQLite` file backend.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::migrations;
use super::StorageBackend;

/// Key-value backend persisted in a single `SQLite` file.
///
/// Values are UTF-8 text. The backend enforces an optional byte quota over
/// the sum of key and value lengths, mirroring the per-origin limit of a
/// browser's local storage.
#[derive(Debug)]
pub struct SqliteBackend {
    path: PathBuf,
    conn: Connection,
    quota_bytes: u64,
}

impl SqliteBackend {
    /// Open or create a store at `path`. A quota of 0 means unlimited.
    ///
    /// Creates the parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>, quota_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening store at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&mut conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self {
            path,
            conn,
            quota_bytes,
        })
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(quota_bytes: u64) -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            quota_bytes,
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes used by every key and value except `excluding`.
    fn bytes_used_excluding(&self, excluding: &str) -> Result<u64> {
        let used: i64 = self.conn.query_row(
            r"
            SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
            FROM items WHERE key != ?1
            ",
            [excluding],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(used).unwrap_or(0))
    }

    /// Usage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let keys: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        let bytes_used = self.bytes_used_excluding("")?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            keys: usize::try_from(keys).unwrap_or(0),
            bytes_used,
            quota_bytes: self.quota_bytes,
            db_size_bytes,
        })
    }
}

impl StorageBackend for SqliteBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM items WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if self.quota_bytes > 0 {
            let needed = self.bytes_used_excluding(key)? + (key.len() + value.len()) as u64;
            if needed > self.quota_bytes {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota: self.quota_bytes,
                });
            }
        }

        self.conn.execute(
            r"
            INSERT INTO items (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        let affected = self.conn.execute("DELETE FROM items WHERE key = ?1", [key])?;
        if affected > 0 {
            debug!(key, "Removed item");
        }
        Ok(())
    }
}

/// Statistics about a `SQLite` store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Number of keys stored.
    pub keys: usize,
    /// Bytes used by keys and values.
    pub bytes_used: u64,
    /// Configured quota in bytes (0 means unlimited).
    pub quota_bytes: u64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

//! `SQLite` schema for the key-value store.

/// Table holding one row per key.
pub const CREATE_ITEMS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS items (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
";

/// Table holding store metadata such as the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Statements run on every open, before migrations.
pub const BASE_STATEMENTS: &[&str] = &[CREATE_METADATA_TABLE];

/// Versioned migrations, applied in order. Index `i` brings the schema to
/// version `i + 1`.
pub const MIGRATIONS: &[&str] = &[
    CREATE_ITEMS_TABLE,
    "ALTER TABLE items ADD COLUMN updated_at TEXT",
];

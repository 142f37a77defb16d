//! v001 -- Initial schema creation.
//!
//! Creates the two cache tables: `cache_namespaces` (one row per list, e.g.
//! `local_catches` or `comments_<catchId>`) and `cache_entries` (the
//! append-ordered records inside each list).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Namespaces
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name       TEXT PRIMARY KEY NOT NULL,   -- 'local_catches' | 'comments_<catchId>'
    kind       TEXT NOT NULL,               -- 'catches' | 'comments'
    parent_id  TEXT,                        -- owning catch id for comment lists
    created_at TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Entries
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cache_entries (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,  -- append order
    namespace      TEXT NOT NULL,                      -- FK -> cache_namespaces(name)
    id             TEXT NOT NULL,                      -- record id (local- prefixed for catches)
    schema_version INTEGER NOT NULL,
    body           TEXT NOT NULL,                      -- JSON record
    stored_at      TEXT NOT NULL,                      -- RFC-3339

    FOREIGN KEY (namespace) REFERENCES cache_namespaces(name) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_cache_entries_ns_id
    ON cache_entries(namespace, id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

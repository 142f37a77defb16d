//! Generic append-ordered lists.
//!
//! Each [`CacheKind`] maps to one namespace. Entries keep their append
//! position; re-appending an existing id replaces the body in place.
//! Bodies are JSON and are schema-checked on the way in and on the way out.
//! Entries that fail to decode are skipped with a warning so one bad row
//! never hides the rest of the list.
//!
//! Catches and comments are linked: appending a catch opens the comment list
//! keyed by the same id, appending or removing a comment adjusts the parent
//! catch's `commentsCount` when the parent lives in the cache, and removing a
//! catch drops its comment list.

use chrono::Utc;
use fangst_shared::records::Versioned;
use fangst_shared::CatchRecord;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::Result;
use crate::models::{CacheKind, CacheRecord, NamespaceInfo, CATCHES_NAMESPACE};

impl Database {
    /// Append `record` to the list for `kind`.
    pub fn append<T: CacheRecord>(&self, kind: &CacheKind, record: &T) -> Result<()> {
        record.validate()?;
        let id = record.cache_id();

        let namespace = kind.namespace();
        let tx = self.conn().unchecked_transaction()?;
        ensure_namespace(&tx, kind)?;
        let existed = entry_exists(&tx, &namespace, id)?;
        insert_entry(&tx, &namespace, id, record)?;
        match kind {
            CacheKind::Catches => {
                ensure_namespace(&tx, &CacheKind::Comments(id.into()))?;
            }
            CacheKind::Comments(parent) if !existed => {
                adjust_comment_count(&tx, parent.as_str(), 1)?;
            }
            CacheKind::Comments(_) => {}
        }
        tx.commit()?;

        tracing::debug!(kind = kind.label(), id, "appended to local cache");
        Ok(())
    }

    /// All records for `kind` in append order.
    pub fn list_all<T>(&self, kind: &CacheKind) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Versioned,
    {
        let namespace = kind.namespace();
        let mut stmt = self.conn().prepare(
            "SELECT id, body FROM cache_entries
             WHERE namespace = ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![namespace], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match decode::<T>(&body) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(namespace = %namespace, id = %id, error = %e, "skipping unreadable cache entry");
                }
            }
        }
        Ok(records)
    }

    /// Fetch a single record by id.
    pub fn get_entry<T>(&self, kind: &CacheKind, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Versioned,
    {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM cache_entries WHERE namespace = ?1 AND id = ?2",
                params![kind.namespace(), id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| decode::<T>(&b)).transpose()
    }

    /// Remove a record. Returns `true` if a row was deleted.
    pub fn remove_if_present(&self, kind: &CacheKind, id: &str) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;
        let affected = tx.execute(
            "DELETE FROM cache_entries WHERE namespace = ?1 AND id = ?2",
            params![kind.namespace(), id],
        )?;
        match kind {
            CacheKind::Catches => {
                tx.execute(
                    "DELETE FROM cache_namespaces WHERE name = ?1",
                    params![CacheKind::Comments(id.into()).namespace()],
                )?;
            }
            CacheKind::Comments(parent) if affected > 0 => {
                adjust_comment_count(&tx, parent.as_str(), -1)?;
            }
            CacheKind::Comments(_) => {}
        }
        tx.commit()?;
        Ok(affected > 0)
    }

    /// Rewrite a record in place. Returns the updated record, or `None` if
    /// the id is not in the list.
    pub fn update_entry<T, F>(&self, kind: &CacheKind, id: &str, mutate: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Versioned,
        F: FnOnce(&mut T),
    {
        let tx = self.conn().unchecked_transaction()?;
        let updated = update_in(&tx, &kind.namespace(), id, mutate)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Whether the list for `kind` has been created.
    pub fn namespace_exists(&self, kind: &CacheKind) -> Result<bool> {
        let found: Option<String> = self
            .conn()
            .query_row(
                "SELECT name FROM cache_namespaces WHERE name = ?1",
                params![kind.namespace()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Every namespace with its entry count, for inspection.
    pub fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let mut stmt = self.conn().prepare(
            "SELECT n.name, n.kind, n.parent_id, COUNT(e.seq)
             FROM cache_namespaces n
             LEFT JOIN cache_entries e ON e.namespace = n.name
             GROUP BY n.name
             ORDER BY n.created_at ASC, n.name ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(NamespaceInfo {
                name: row.get(0)?,
                kind: row.get(1)?,
                parent_id: row.get(2)?,
                entries: row.get::<_, i64>(3)?.max(0) as u64,
            })
        })?;

        let mut namespaces = Vec::new();
        for row in rows {
            namespaces.push(row?);
        }
        Ok(namespaces)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with the typed catch/comment operations
// ---------------------------------------------------------------------------

fn ensure_namespace(conn: &Connection, kind: &CacheKind) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_namespaces (name, kind, parent_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            kind.namespace(),
            kind.label(),
            kind.parent_str(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_entry<T>(conn: &Connection, namespace: &str, id: &str, record: &T) -> Result<()>
where
    T: Serialize + Versioned,
{
    let body = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO cache_entries (namespace, id, schema_version, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(namespace, id) DO UPDATE SET
             schema_version = excluded.schema_version,
             body = excluded.body,
             stored_at = excluded.stored_at",
        params![
            namespace,
            id,
            record.schema_version(),
            body,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn entry_exists(conn: &Connection, namespace: &str, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT seq FROM cache_entries WHERE namespace = ?1 AND id = ?2",
            params![namespace, id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn update_in<T, F>(conn: &Connection, namespace: &str, id: &str, mutate: F) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + Versioned,
    F: FnOnce(&mut T),
{
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM cache_entries WHERE namespace = ?1 AND id = ?2",
            params![namespace, id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(body) = body else {
        return Ok(None);
    };

    let mut record = decode::<T>(&body)?;
    mutate(&mut record);
    record.validate()?;

    conn.execute(
        "UPDATE cache_entries SET body = ?1, stored_at = ?2 WHERE namespace = ?3 AND id = ?4",
        params![
            serde_json::to_string(&record)?,
            Utc::now().to_rfc3339(),
            namespace,
            id,
        ],
    )?;
    Ok(Some(record))
}

/// Bump a cached catch's `commentsCount`; a parent that is not in the cache
/// (a remote or placeholder catch) is left alone.
fn adjust_comment_count(conn: &Connection, catch_id: &str, delta: i32) -> Result<()> {
    update_in(conn, CATCHES_NAMESPACE, catch_id, |c: &mut CatchRecord| {
        c.comments_count = if delta >= 0 {
            c.comments_count.saturating_add(delta.unsigned_abs())
        } else {
            c.comments_count.saturating_sub(delta.unsigned_abs())
        };
    })?;
    Ok(())
}

fn decode<T>(body: &str) -> Result<T>
where
    T: DeserializeOwned + Versioned,
{
    let record: T = serde_json::from_str(body)?;
    record.validate()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fangst_shared::{CatchId, CommentId, CommentRecord, Timestamp};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("cache.db")).unwrap();
        (dir, db)
    }

    fn comment(id: &str, text: &str) -> CommentRecord {
        CommentRecord {
            schema_version: fangst_shared::constants::SCHEMA_VERSION,
            id: CommentId(id.to_string()),
            catch_id: CatchId::from("local-1"),
            author_id: "u1".into(),
            display_name: "Pelle".into(),
            photo_ref: None,
            text: text.into(),
            created_at: Some(Timestamp::Millis(1.0)),
        }
    }

    #[test]
    fn list_keeps_append_order() {
        let (_dir, db) = open();
        let kind = CacheKind::Comments(CatchId::from("local-1"));

        for (id, text) in [("b", "first"), ("a", "second"), ("c", "third")] {
            db.append(&kind, &comment(id, text)).unwrap();
        }

        let texts: Vec<String> = db
            .list_all::<CommentRecord>(&kind)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn reappend_replaces_in_place() {
        let (_dir, db) = open();
        let kind = CacheKind::Comments(CatchId::from("local-1"));

        db.append(&kind, &comment("a", "one")).unwrap();
        db.append(&kind, &comment("b", "two")).unwrap();
        db.append(&kind, &comment("a", "edited")).unwrap();

        let list = db.list_all::<CommentRecord>(&kind).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].text, "edited");
    }

    #[test]
    fn remove_if_present_is_idempotent() {
        let (_dir, db) = open();
        let kind = CacheKind::Comments(CatchId::from("local-1"));
        db.append(&kind, &comment("a", "one")).unwrap();

        assert!(db.remove_if_present(&kind, "a").unwrap());
        assert!(!db.remove_if_present(&kind, "a").unwrap());
        assert!(db.list_all::<CommentRecord>(&kind).unwrap().is_empty());
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let (_dir, db) = open();
        let kind = CacheKind::Comments(CatchId::from("local-1"));
        db.append(&kind, &comment("a", "ok")).unwrap();
        db.conn()
            .execute(
                "INSERT INTO cache_entries (namespace, id, schema_version, body, stored_at)
                 VALUES (?1, 'broken', 1, '{not json', '')",
                params![kind.namespace()],
            )
            .unwrap();

        let list = db.list_all::<CommentRecord>(&kind).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn future_schema_is_refused_on_write() {
        let (_dir, db) = open();
        let kind = CacheKind::Comments(CatchId::from("local-1"));
        let mut c = comment("a", "x");
        c.schema_version = 99;

        assert!(db.append(&kind, &c).is_err());
        assert!(!db.namespace_exists(&kind).unwrap());
    }
}

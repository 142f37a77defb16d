//! In-process [`RemoteStore`] with fault injection.
//!
//! Used by tests and the CLI demo. Writes notify every live subscription
//! whose target they touch. Latency and outages are injected per store.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use fangst_shared::timestamp::sort_key;
use fangst_shared::Timestamp;

use super::{
    is_server_timestamp, Direction, DocPath, Document, FieldOp, Query, RemoteStore, Snapshot,
    Subscription,
};
use crate::error::RemoteError;

enum Target {
    Doc(DocPath),
    Query(Query),
}

struct Subscriber {
    target: Target,
    tx: mpsc::UnboundedSender<Result<Snapshot, RemoteError>>,
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    subscribers: Vec<Subscriber>,
    offline: bool,
    stall_reads: bool,
    write_delay: Option<Duration>,
    failing: HashSet<String>,
    writes: usize,
}

/// Shared handle; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RemoteError> {
        self.inner
            .lock()
            .map_err(|_| RemoteError::Unavailable("memory store lock poisoned".into()))
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// While offline every read and write fails with `Unavailable` and new
    /// subscriptions receive an error as their first event.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offline = offline;
        }
    }

    /// Reads and new subscriptions never answer.
    pub fn set_stall_reads(&self, stall: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.stall_reads = stall;
        }
    }

    /// Every write waits this long before landing. A write whose future is
    /// dropped while waiting never lands.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.write_delay = delay;
        }
    }

    /// Writes to `collection` fail with `Rejected`.
    pub fn fail_writes_to(&self, collection: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(collection.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.clear();
        }
    }

    /// Number of writes that reached the store (including rejected ones).
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Direct access
    // ------------------------------------------------------------------

    /// Insert a document without counting a write or checking faults.
    pub fn seed(&self, path: &DocPath, doc: Document) {
        if let Ok(mut inner) = self.inner.lock() {
            let doc = resolve_server_timestamps(doc);
            inner
                .collections
                .entry(path.collection.clone())
                .or_default()
                .insert(path.id.clone(), doc);
            notify(&mut inner);
        }
    }

    /// Current document body, ignoring faults.
    pub fn document(&self, path: &DocPath) -> Option<Document> {
        let inner = self.inner.lock().ok()?;
        inner
            .collections
            .get(&path.collection)
            .and_then(|c| c.get(&path.id))
            .cloned()
    }

    pub fn collection_len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .map(|i| i.collections.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn before_read(&self) -> Result<(), RemoteError> {
        let stall = {
            let inner = self.lock()?;
            if inner.offline {
                return Err(RemoteError::Unavailable("offline".into()));
            }
            inner.stall_reads
        };
        if stall {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn before_write(&self, path: &DocPath) -> Result<(), RemoteError> {
        let delay = {
            let mut inner = self.lock()?;
            inner.writes += 1;
            if inner.offline {
                return Err(RemoteError::Unavailable("offline".into()));
            }
            if inner.failing.contains(&path.collection) {
                return Err(RemoteError::Rejected(format!("writes to {} rejected", path.collection)));
            }
            inner.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn commit<F>(&self, mutate: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&mut Inner) -> Result<(), RemoteError>,
    {
        let mut inner = self.lock()?;
        mutate(&mut *inner)?;
        notify(&mut inner);
        Ok(())
    }
}

fn server_now() -> Value {
    let now = Utc::now();
    serde_json::json!({
        "seconds": now.timestamp(),
        "nanoseconds": now.timestamp_subsec_nanos(),
    })
}

fn resolve_server_timestamps(mut doc: Document) -> Document {
    for value in doc.values_mut() {
        if is_server_timestamp(value) {
            *value = server_now();
        }
    }
    doc
}

fn run_query(inner: &Inner, query: &Query) -> Snapshot {
    let mut docs: Vec<(String, Document)> = inner
        .collections
        .get(&query.collection)
        .map(|c| {
            c.iter()
                .filter(|(_, doc)| query.matches(doc))
                .map(|(id, doc)| (id.clone(), doc.clone()))
                .collect()
        })
        .unwrap_or_default();

    if let Some((field, direction)) = &query.order_by {
        docs.sort_by_key(|(_, doc)| {
            let ts = doc
                .get(field)
                .and_then(|v| serde_json::from_value::<Timestamp>(v.clone()).ok());
            sort_key(ts.as_ref())
        });
        if *direction == Direction::Descending {
            docs.reverse();
        }
    }
    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }
    Snapshot { docs }
}

fn doc_snapshot(inner: &Inner, path: &DocPath) -> Snapshot {
    let docs = inner
        .collections
        .get(&path.collection)
        .and_then(|c| c.get(&path.id))
        .map(|doc| vec![(path.id.clone(), doc.clone())])
        .unwrap_or_default();
    Snapshot { docs }
}

fn notify(inner: &mut Inner) {
    let view: &Inner = inner;
    let snapshots: Vec<Snapshot> = view
        .subscribers
        .iter()
        .map(|sub| match &sub.target {
            Target::Doc(path) => doc_snapshot(view, path),
            Target::Query(query) => run_query(view, query),
        })
        .collect();

    // Closed receivers are pruned here; that is how unsubscribe takes effect.
    let mut snapshots = snapshots.into_iter();
    inner
        .subscribers
        .retain(|sub| snapshots.next().is_some_and(|snapshot| sub.tx.send(Ok(snapshot)).is_ok()));
}

fn apply_op(doc: &mut Document, field: String, op: FieldOp) {
    match op {
        FieldOp::Set(value) => {
            let value = if is_server_timestamp(&value) { server_now() } else { value };
            doc.insert(field, value);
        }
        FieldOp::Increment(by) => {
            let current = doc.get(&field).and_then(Value::as_i64).unwrap_or(0);
            doc.insert(field, Value::from(current.saturating_add(by)));
        }
        FieldOp::ServerTimestamp => {
            doc.insert(field, server_now());
        }
        FieldOp::Delete => {
            doc.remove(&field);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, RemoteError> {
        self.before_read().await?;
        Ok(self.document(path))
    }

    async fn set(&self, path: &DocPath, doc: Document) -> Result<(), RemoteError> {
        self.before_write(path).await?;
        let doc = resolve_server_timestamps(doc);
        self.commit(|inner| {
            inner
                .collections
                .entry(path.collection.clone())
                .or_default()
                .insert(path.id.clone(), doc);
            Ok(())
        })
    }

    async fn create(&self, path: &DocPath, doc: Document) -> Result<(), RemoteError> {
        self.before_write(path).await?;
        let doc = resolve_server_timestamps(doc);
        self.commit(|inner| {
            let collection = inner.collections.entry(path.collection.clone()).or_default();
            if collection.contains_key(&path.id) {
                return Err(RemoteError::AlreadyExists(path.to_string()));
            }
            collection.insert(path.id.clone(), doc);
            Ok(())
        })
    }

    async fn update(&self, path: &DocPath, ops: Vec<(String, FieldOp)>) -> Result<(), RemoteError> {
        self.before_write(path).await?;
        self.commit(|inner| {
            let doc = inner
                .collections
                .get_mut(&path.collection)
                .and_then(|c| c.get_mut(&path.id))
                .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
            for (field, op) in ops {
                apply_op(doc, field, op);
            }
            Ok(())
        })
    }

    async fn delete(&self, path: &DocPath) -> Result<(), RemoteError> {
        self.before_write(path).await?;
        self.commit(|inner| {
            if let Some(collection) = inner.collections.get_mut(&path.collection) {
                collection.remove(&path.id);
            }
            Ok(())
        })
    }

    async fn query(&self, query: &Query) -> Result<Snapshot, RemoteError> {
        self.before_read().await?;
        let inner = self.lock()?;
        Ok(run_query(&inner, query))
    }

    fn subscribe_query(&self, query: Query) -> Subscription {
        subscribe(self, Target::Query(query))
    }

    fn subscribe_doc(&self, path: DocPath) -> Subscription {
        subscribe(self, Target::Doc(path))
    }
}

fn subscribe(store: &MemoryRemoteStore, target: Target) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    match store.inner.lock() {
        Ok(mut inner) => {
            if inner.offline {
                let _ = tx.send(Err(RemoteError::Unavailable("offline".into())));
            } else {
                if !inner.stall_reads {
                    let initial = match &target {
                        Target::Doc(path) => doc_snapshot(&inner, path),
                        Target::Query(query) => run_query(&inner, query),
                    };
                    let _ = tx.send(Ok(initial));
                }
                inner.subscribers.push(Subscriber { target, tx });
            }
        }
        Err(_) => {
            let _ = tx.send(Err(RemoteError::Unavailable("memory store lock poisoned".into())));
        }
    }
    Subscription::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::server_timestamp;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn set_resolves_server_timestamp() {
        let store = MemoryRemoteStore::new();
        let path = DocPath::new("catches", "c1");
        store
            .set(&path, doc(json!({ "createdAt": server_timestamp() })))
            .await
            .unwrap();
        let stored = store.document(&path).unwrap();
        assert!(stored["createdAt"].get("seconds").is_some());
    }

    #[tokio::test]
    async fn create_refuses_an_existing_document() {
        let store = MemoryRemoteStore::new();
        let path = DocPath::new("likes", "c1_u1");
        store.create(&path, Document::new()).await.unwrap();
        let again = store.create(&path, Document::new()).await;
        assert!(matches!(again, Err(RemoteError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn update_increments_atomically_and_requires_document() {
        let store = MemoryRemoteStore::new();
        let path = DocPath::new("catches", "c1");
        let missing = store
            .update(&path, vec![("likesCount".into(), FieldOp::Increment(1))])
            .await;
        assert!(matches!(missing, Err(RemoteError::NotFound(_))));

        store.seed(&path, doc(json!({ "likesCount": 3 })));
        store
            .update(&path, vec![("likesCount".into(), FieldOp::Increment(1))])
            .await
            .unwrap();
        store
            .update(&path, vec![("likesCount".into(), FieldOp::Increment(-2))])
            .await
            .unwrap();
        assert_eq!(store.document(&path).unwrap()["likesCount"], json!(2));
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryRemoteStore::new();
        for (id, ms, public) in [("a", 1, true), ("b", 3, true), ("c", 2, false), ("d", 4, true)] {
            store.seed(
                &DocPath::new("catches", id),
                doc(json!({ "createdAt": ms, "isPublic": public })),
            );
        }
        let snapshot = store
            .query(
                &Query::collection("catches")
                    .where_eq("isPublic", true)
                    .order_by("createdAt", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        let ids: Vec<_> = snapshot.docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b"]);
    }

    #[tokio::test]
    async fn offline_store_rejects_and_counts_writes() {
        let store = MemoryRemoteStore::new();
        store.set_offline(true);
        let err = store
            .set(&DocPath::new("users", "u1"), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.collection_len("users"), 0);
    }

    #[tokio::test]
    async fn subscriptions_receive_initial_and_pushed_snapshots() {
        let store = MemoryRemoteStore::new();
        let path = DocPath::new("users", "u1");
        let mut sub = store.subscribe_doc(path.clone());
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        store.set(&path, doc(json!({ "uid": "u1" }))).await.unwrap();
        let pushed = sub.next().await.unwrap().unwrap();
        assert_eq!(pushed.len(), 1);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let store = MemoryRemoteStore::new();
        let sub = store.subscribe_query(Query::collection("catches"));
        drop(sub);
        store.seed(&DocPath::new("catches", "c1"), Document::new());
        assert_eq!(store.inner.lock().unwrap().subscribers.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_delayed_write_never_lands() {
        let store = MemoryRemoteStore::new();
        store.set_write_delay(Some(Duration::from_secs(5)));
        let path = DocPath::new("catches", "slow");
        let write = store.set(&path, Document::new());
        let result = tokio::time::timeout(Duration::from_secs(1), write).await;
        assert!(result.is_err());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.document(&path).is_none());
    }
}

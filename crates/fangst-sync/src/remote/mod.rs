//! Remote document store interface.
//!
//! Documents live at `collection/id`. Sub-collections are addressed by a
//! collection path such as `catches/{id}/comments`. Every call is async and
//! may take arbitrarily long; callers that block a user flow wrap writes in
//! [`crate::guard::guarded_write`].

pub mod codec;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use fangst_shared::constants::{
    CATCHES_COLLECTION, COMMENTS_COLLECTION, LIKES_COLLECTION, USERS_COLLECTION,
};
use fangst_shared::{CatchId, CommentId, LikeRecord, UserId};

use crate::error::RemoteError;

pub use memory::MemoryRemoteStore;

/// Raw document body.
pub type Document = serde_json::Map<String, Value>;

/// Key of the sentinel object that asks the store to fill in its own clock.
pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel value resolved to the store's clock when the write lands.
pub fn server_timestamp() -> Value {
    let mut map = serde_json::Map::new();
    map.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(map)
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.len() == 1 && m.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn user(uid: &UserId) -> Self {
        Self::new(USERS_COLLECTION, uid.as_str())
    }

    pub fn catch(id: &CatchId) -> Self {
        Self::new(CATCHES_COLLECTION, id.as_str())
    }

    pub fn comment(catch_id: &CatchId, comment_id: &CommentId) -> Self {
        Self::new(comments_collection(catch_id), comment_id.as_str())
    }

    pub fn like(catch_id: &CatchId, uid: &UserId) -> Self {
        Self::new(LIKES_COLLECTION, LikeRecord::doc_id(catch_id, uid))
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// `catches/{id}/comments`
pub fn comments_collection(catch_id: &CatchId) -> String {
    format!("{CATCHES_COLLECTION}/{catch_id}/{COMMENTS_COLLECTION}")
}

// ---------------------------------------------------------------------------
// Field operations
// ---------------------------------------------------------------------------

/// A single field change applied atomically by [`RemoteStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Atomic add; a missing field counts as 0.
    Increment(i64),
    ServerTimestamp,
    Delete,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Equality filter.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Result of a read: `(id, body)` pairs in query order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub docs: Vec<(String, Document)>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }
}

/// A live view. Each change matching the subscription pushes a fresh
/// snapshot. Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Snapshot, RemoteError>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Snapshot, RemoteError>>) -> Self {
        Self { rx }
    }

    /// Next pushed snapshot, `None` once the store closes the stream.
    pub async fn next(&mut self) -> Option<Result<Snapshot, RemoteError>> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, RemoteError>;

    /// Create or overwrite.
    async fn set(&self, path: &DocPath, doc: Document) -> Result<(), RemoteError>;

    /// Create, failing with `AlreadyExists` when the document is present.
    async fn create(&self, path: &DocPath, doc: Document) -> Result<(), RemoteError>;

    /// Apply field operations atomically. `NotFound` if the document is missing.
    async fn update(&self, path: &DocPath, ops: Vec<(String, FieldOp)>) -> Result<(), RemoteError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &DocPath) -> Result<(), RemoteError>;

    async fn query(&self, query: &Query) -> Result<Snapshot, RemoteError>;

    fn subscribe_query(&self, query: Query) -> Subscription;

    fn subscribe_doc(&self, path: DocPath) -> Subscription;
}

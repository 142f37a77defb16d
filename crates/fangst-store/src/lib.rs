//! # fangst-store
//!
//! Local durable cache for the Fångst sync engine, backed by SQLite.
//!
//! The cache is the fallback tier used when a remote write times out or
//! fails. It holds append-ordered lists per entity kind (catches, and one
//! comment list per catch), keyed by locally generated identifiers, and
//! survives process restarts. It is never synced across devices.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`. Callers that share it between tasks are expected to
//! serialise access (the sync engine holds it behind a mutex).

pub mod cache;
pub mod catches;
pub mod database;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;

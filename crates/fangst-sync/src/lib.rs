//! # fangst-sync
//!
//! Offline-tolerant sync engine for the Fångst catch log.
//!
//! The engine sits between the UI and a remote document store whose latency
//! and availability are unbounded:
//!
//! - **Guarded writes** ([`guard`]) race blocking writes against a deadline.
//! - **Local fallback** ([`cache`]) keeps catches that could not be written
//!   remotely in the on-device SQLite cache from `fangst-store`.
//! - **Reconciliation** ([`reconcile`]) merges remote and local records into
//!   one newest-first view, and supplies the degraded view when the remote
//!   store is unreachable.
//! - **Optimistic mutations** ([`optimistic`]) show likes immediately and
//!   restore the exact prior state when the write fails.
//! - **Entitlements** ([`session`], [`metered`], [`entitlements`]) gate the
//!   metered AI actions on premium status and quota.

pub mod admin;
pub mod ai;
pub mod cache;
pub mod catches;
pub mod comments;
pub mod config;
pub mod context;
pub mod engine;
pub mod entitlements;
pub mod error;
pub mod feed;
pub mod guard;
pub mod likes;
pub mod metered;
pub mod optimistic;
pub mod payment;
pub mod reconcile;
pub mod remote;
pub mod session;

pub use cache::LocalCache;
pub use config::{QuotaPolicy, SyncConfig};
pub use context::SyncContext;
pub use engine::{Collaborators, SyncEngine};
pub use error::{RemoteError, Result, SyncError};
pub use guard::{guarded_write, OnTimeout, WriteOutcome};
pub use reconcile::{degraded_view, reconcile};
pub use remote::{MemoryRemoteStore, RemoteStore};

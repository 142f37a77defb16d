//! Creation-time encodings and their normalisation to epoch milliseconds.
//!
//! Records reach the engine from two places. The remote store assigns a
//! server timestamp object (`{seconds, nanoseconds}`) which may still be
//! pending (`null`) right after a write; the local cache stores a plain epoch
//! number. Older local entries may also carry an RFC 3339 string. All three
//! are accepted and compared on a single numeric axis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Server-assigned timestamp.
    Server { seconds: i64, nanoseconds: u32 },
    /// Epoch milliseconds.
    Millis(f64),
    /// RFC 3339 text, or a number that was serialised as a string.
    Text(String),
}

impl Timestamp {
    pub fn now_millis() -> Self {
        Self::Millis(Utc::now().timestamp_millis() as f64)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::Server {
            seconds: dt.timestamp(),
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }

    /// Normalised epoch milliseconds, `None` when the value is unusable.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Self::Server {
                seconds,
                nanoseconds,
            } => seconds
                .checked_mul(1_000)
                .and_then(|ms| ms.checked_add(i64::from(*nanoseconds / 1_000_000))),
            Self::Millis(ms) if ms.is_finite() => Some(*ms as i64),
            Self::Millis(_) => None,
            Self::Text(text) => {
                let text = text.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                    return Some(dt.timestamp_millis());
                }
                text.parse::<f64>()
                    .ok()
                    .filter(|ms| ms.is_finite())
                    .map(|ms| ms as i64)
            }
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.epoch_millis().and_then(DateTime::from_timestamp_millis)
    }
}

/// Sort key for an optional creation time: missing or unparseable sorts as epoch 0.
pub fn sort_key(ts: Option<&Timestamp>) -> i64 {
    ts.and_then(Timestamp::epoch_millis).unwrap_or(0)
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{LOCAL_ID_PREFIX, PLACEHOLDER_ID_PREFIX};

// Catch identifier. Remote ids are bare uuids, locally originated ids carry
// `local-`, synthetic feed entries carry `placeholder-`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CatchId(pub String);

/// Where a catch identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Local,
    Placeholder,
}

impl CatchId {
    /// Fresh uuid shared by a remote save attempt and its local fallback.
    pub fn new_remote() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The local-cache twin of a remote id (`local-<uuid>`).
    pub fn to_local(&self) -> Self {
        match self.origin() {
            Origin::Remote => Self(format!("{LOCAL_ID_PREFIX}{}", self.0)),
            _ => self.clone(),
        }
    }

    pub fn origin(&self) -> Origin {
        if self.0.starts_with(LOCAL_ID_PREFIX) {
            Origin::Local
        } else if self.0.starts_with(PLACEHOLDER_ID_PREFIX) {
            Origin::Placeholder
        } else {
            Origin::Remote
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin() == Origin::Local
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin() == Origin::Placeholder
    }

    /// Mutations on local and placeholder records never reach the remote store.
    pub fn is_remote(&self) -> bool {
        self.origin() == Origin::Remote
    }

    /// The id with the local prefix stripped.
    ///
    /// A local fallback written as `local-<uuid>` and its remote twin `<uuid>`
    /// share the same canonical key. Placeholder ids keep their prefix so they
    /// can never collide with a real record.
    pub fn canonical(&self) -> &str {
        self.0.strip_prefix(LOCAL_ID_PREFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new_local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}comment-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Account identifier issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_twin_shares_canonical_key() {
        let remote = CatchId::new_remote();
        let local = remote.to_local();

        assert!(remote.is_remote());
        assert!(local.is_local());
        assert_eq!(remote.canonical(), local.canonical());
        assert_eq!(local.to_local(), local);
    }

    #[test]
    fn placeholder_is_not_remote() {
        let id = CatchId::from("placeholder-1");
        assert!(id.is_placeholder());
        assert!(!id.is_remote());
        assert_eq!(id.canonical(), "placeholder-1");
    }
}

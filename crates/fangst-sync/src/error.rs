use fangst_shared::{Denial, ValidationError};
use fangst_store::StoreError;
use thiserror::Error;

/// Failures reported by a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    #[error("Remote document not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Remote document already exists: {0}")]
    AlreadyExists(String),

    #[error("Could not decode remote document: {0}")]
    Decode(String),
}

/// Engine error taxonomy.
///
/// - `TransientRemoteFailure` triggers fallback and is not a hard error.
/// - `AuthorizationDenied` always reaches the user as an actionable message.
/// - `ValidationFailure` and `NotPermitted` are shown inline; nothing was persisted.
/// - `IrrecoverableFailure` means both tiers failed; the user should retry.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote store unavailable: {0}")]
    TransientRemoteFailure(String),

    #[error("Not authorized: {0}")]
    AuthorizationDenied(Denial),

    #[error("Invalid input: {0}")]
    ValidationFailure(#[from] ValidationError),

    #[error("Not permitted: {0}")]
    NotPermitted(&'static str),

    #[error("Could not save, please try again: {0}")]
    IrrecoverableFailure(String),
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Decode(msg) => SyncError::IrrecoverableFailure(msg),
            RemoteError::PermissionDenied(_) => SyncError::NotPermitted("rejected by remote access rules"),
            other => SyncError::TransientRemoteFailure(other.to_string()),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(v) => SyncError::ValidationFailure(v),
            other => SyncError::IrrecoverableFailure(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

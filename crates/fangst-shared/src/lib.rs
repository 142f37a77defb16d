// Record schema, identifiers and entitlement rules shared by the store and the sync engine.

pub mod constants;
pub mod entitlement;
pub mod error;
pub mod records;
pub mod timestamp;
pub mod types;

pub use entitlement::{authorize, Decision, Denial, EntitlementGrant, MeteredAction};
pub use error::ValidationError;
pub use records::*;
pub use timestamp::Timestamp;
pub use types::{CatchId, CommentId, UserId};

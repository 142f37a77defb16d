/// Application name
pub const APP_NAME: &str = "Fångst";

/// Current record schema version written into every persisted record.
pub const SCHEMA_VERSION: u32 = 1;

/// Identifier prefix for records that only exist in the local cache.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Identifier prefix for the synthetic degraded-mode feed entries.
pub const PLACEHOLDER_ID_PREFIX: &str = "placeholder-";

/// Remote collection names
pub const USERS_COLLECTION: &str = "users";
pub const CATCHES_COLLECTION: &str = "catches";
pub const COMMENTS_COLLECTION: &str = "comments";
pub const LIKES_COLLECTION: &str = "likes";

/// Quota granted to a freshly bootstrapped profile.
pub const DEFAULT_AI_QUOTA: u32 = 500;

/// Quota granted by a lifetime purchase.
pub const LIFETIME_AI_QUOTA: u32 = 500;

/// Quota granted by the trial promo code.
pub const TRIAL_AI_QUOTA: u32 = 50;

/// Length of a promo trial in days.
pub const TRIAL_DAYS: i64 = 7;

/// Catch-save remote write deadline (short: fallback is acceptable).
pub const CATCH_SAVE_DEADLINE_MS: u64 = 1_000;

/// Profile bootstrap / entitlement write deadline (long: user is blocked anyway).
pub const PROFILE_WRITE_DEADLINE_MS: u64 = 10_000;

/// Deadline for the first remote feed snapshot before degraded mode kicks in.
pub const FEED_READ_DEADLINE_MS: u64 = 1_500;

/// Deadline for other blocking writes (comments, visibility, moderation).
pub const DEFAULT_WRITE_DEADLINE_MS: u64 = 5_000;

/// Maximum number of public catches fetched for the community feed.
pub const FEED_LIMIT: usize = 20;

/// Chat turns forwarded to the assistant along with a new message.
pub const CHAT_HISTORY_TURNS: usize = 10;

//! Engine configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the engine can start with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use fangst_shared::constants::{
    CATCH_SAVE_DEADLINE_MS, DEFAULT_WRITE_DEADLINE_MS, FEED_LIMIT, FEED_READ_DEADLINE_MS,
    PROFILE_WRITE_DEADLINE_MS,
};

/// How the session treats quota use that races the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPolicy {
    /// In-flight actions count against the quota and the visible counter
    /// never exceeds the total.
    Hard,
    /// Check, then increment after success. Rapid use can overshoot.
    Soft,
}

impl std::str::FromStr for QuotaPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            other => Err(format!("unknown quota policy: {other}")),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local cache file. `None` uses the platform data directory.
    /// Env: `FANGST_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Deadline for catch-save writes before falling back to the local cache.
    /// Env: `FANGST_CATCH_SAVE_DEADLINE_MS`
    /// Default: 1000 ms
    pub catch_save_deadline: Duration,

    /// Deadline for profile bootstrap and entitlement grants.
    /// Env: `FANGST_PROFILE_DEADLINE_MS`
    /// Default: 10000 ms
    pub profile_deadline: Duration,

    /// How long the feed waits for the first remote snapshot before
    /// publishing the degraded view.
    /// Env: `FANGST_FEED_DEADLINE_MS`
    /// Default: 1500 ms
    pub feed_deadline: Duration,

    /// Deadline for other blocking writes (comments, visibility, bans).
    /// Env: `FANGST_WRITE_DEADLINE_MS`
    /// Default: 5000 ms
    pub write_deadline: Duration,

    /// Env: `FANGST_QUOTA_POLICY` (hard/soft)
    /// Default: hard
    pub quota_policy: QuotaPolicy,

    /// Maximum public catches fetched per feed query.
    /// Env: `FANGST_FEED_LIMIT`
    /// Default: 20
    pub feed_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            catch_save_deadline: Duration::from_millis(CATCH_SAVE_DEADLINE_MS),
            profile_deadline: Duration::from_millis(PROFILE_WRITE_DEADLINE_MS),
            feed_deadline: Duration::from_millis(FEED_READ_DEADLINE_MS),
            write_deadline: Duration::from_millis(DEFAULT_WRITE_DEADLINE_MS),
            quota_policy: QuotaPolicy::Hard,
            feed_limit: FEED_LIMIT,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("FANGST_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        read_millis(&lookup, "FANGST_CATCH_SAVE_DEADLINE_MS", &mut config.catch_save_deadline);
        read_millis(&lookup, "FANGST_PROFILE_DEADLINE_MS", &mut config.profile_deadline);
        read_millis(&lookup, "FANGST_FEED_DEADLINE_MS", &mut config.feed_deadline);
        read_millis(&lookup, "FANGST_WRITE_DEADLINE_MS", &mut config.write_deadline);

        if let Some(val) = lookup("FANGST_QUOTA_POLICY") {
            match val.parse::<QuotaPolicy>() {
                Ok(policy) => config.quota_policy = policy,
                Err(e) => tracing::warn!(error = %e, "Invalid FANGST_QUOTA_POLICY, using default"),
            }
        }

        if let Some(val) = lookup("FANGST_FEED_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.feed_limit = n,
                _ => tracing::warn!(value = %val, "Invalid FANGST_FEED_LIMIT, using default"),
            }
        }

        config
    }
}

fn read_millis<F>(lookup: &F, key: &str, target: &mut Duration)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(val) = lookup(key) else {
        return;
    };
    match val.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => *target = Duration::from_millis(ms),
        _ => tracing::warn!(key, value = %val, "Invalid deadline, using default"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.catch_save_deadline, Duration::from_millis(1_000));
        assert_eq!(config.profile_deadline, Duration::from_millis(10_000));
        assert_eq!(config.quota_policy, QuotaPolicy::Hard);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("FANGST_CATCH_SAVE_DEADLINE_MS", "250"),
            ("FANGST_QUOTA_POLICY", "Soft"),
            ("FANGST_DB_PATH", "/tmp/fangst.db"),
            ("FANGST_FEED_LIMIT", "5"),
        ]));
        assert_eq!(config.catch_save_deadline, Duration::from_millis(250));
        assert_eq!(config.quota_policy, QuotaPolicy::Soft);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/fangst.db")));
        assert_eq!(config.feed_limit, 5);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("FANGST_FEED_DEADLINE_MS", "soon"),
            ("FANGST_WRITE_DEADLINE_MS", "0"),
            ("FANGST_QUOTA_POLICY", "maybe"),
            ("FANGST_FEED_LIMIT", "0"),
        ]));
        assert_eq!(config.feed_deadline, Duration::from_millis(1_500));
        assert_eq!(config.write_deadline, Duration::from_millis(5_000));
        assert_eq!(config.quota_policy, QuotaPolicy::Hard);
        assert_eq!(config.feed_limit, 20);
    }
}

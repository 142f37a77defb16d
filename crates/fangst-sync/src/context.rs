use std::sync::Arc;

use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::remote::RemoteStore;

/// Handles shared by every engine service.
#[derive(Clone)]
pub struct SyncContext {
    pub remote: Arc<dyn RemoteStore>,
    pub cache: LocalCache,
    pub config: SyncConfig,
}

impl SyncContext {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: LocalCache, config: SyncConfig) -> Self {
        Self {
            remote,
            cache,
            config,
        }
    }
}

//! Page cache configuration.

use std::{num::NonZeroUsize, time::Duration};

use crate::config::CacheSettings;

const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(20);
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When disabled no page is stored and every request renders afresh.
    pub enabled: bool,
    /// Lifetime of a cached index page.
    pub index_ttl: Duration,
    /// Maximum number of cached pages before least-recently-used eviction.
    pub capacity: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: DEFAULT_INDEX_TTL,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
            capacity: settings.capacity,
        }
    }
}

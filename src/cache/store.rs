//! Page cache storage.
//!
//! Entries expire after their TTL and are evicted least-recently-used once the
//! store reaches capacity. An expired entry is treated as absent and dropped
//! on the read that discovers it.

use std::{
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::{
    config::CacheConfig,
    keys::PageKey,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "yatube_page_cache_hit_total";
const METRIC_MISS: &str = "yatube_page_cache_miss_total";
const METRIC_EXPIRED: &str = "yatube_page_cache_expired_total";
const METRIC_EVICT: &str = "yatube_page_cache_evict_total";
const METRIC_INVALIDATE: &str = "yatube_page_cache_invalidate_total";

/// A rendered response captured for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Time-to-live keyed store of rendered pages.
pub trait PageCache: Send + Sync {
    /// Stored page for `key`, or `None` when absent or expired.
    fn get(&self, key: &PageKey) -> Option<CachedPage>;

    fn set(&self, key: PageKey, page: CachedPage, ttl: Duration);

    /// Drop a single entry.
    fn invalidate(&self, key: &PageKey);

    /// Drop every entry.
    fn clear(&self);
}

/// Monotonic time source used for expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    page: CachedPage,
    expires_at: Instant,
}

/// In-process LRU page cache with per-entry expiry.
pub struct TtlPageCache<C: Clock = SystemClock> {
    entries: RwLock<LruCache<PageKey, Entry>>,
    clock: C,
}

impl TtlPageCache<SystemClock> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TtlPageCache<C> {
    pub fn with_clock(config: &CacheConfig, clock: C) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity)),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clock> PageCache for TtlPageCache<C> {
    fn get(&self, key: &PageKey) -> Option<CachedPage> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                counter!(METRIC_HIT).increment(1);
                return Some(entry.page.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            counter!(METRIC_EXPIRED).increment(1);
            debug!(key = %key, "page cache entry expired");
        }
        counter!(METRIC_MISS).increment(1);
        None
    }

    fn set(&self, key: PageKey, page: CachedPage, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.clone(), Entry {
            page,
            expires_at,
        });

        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_EVICT).increment(1);
            debug!(key = %evicted_key, "page cache entry evicted");
        }
    }

    fn invalidate(&self, key: &PageKey) {
        if rw_write(&self.entries, SOURCE, "invalidate").pop(key).is_some() {
            counter!(METRIC_INVALIDATE).increment(1);
        }
    }

    fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let dropped = entries.len();
        entries.clear();
        counter!(METRIC_INVALIDATE).increment(dropped as u64);
        debug!(dropped, "page cache cleared");
    }
}

/// Cache used when page caching is switched off: stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPageCache;

impl PageCache for NoopPageCache {
    fn get(&self, _key: &PageKey) -> Option<CachedPage> {
        None
    }

    fn set(&self, _key: PageKey, _page: CachedPage, _ttl: Duration) {}

    fn invalidate(&self, _key: &PageKey) {}

    fn clear(&self) {}
}

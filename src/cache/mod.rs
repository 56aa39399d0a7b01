//! Page cache for rendered listing pages.
//!
//! The index listing is cached for a short TTL. Writers that change what the
//! index shows (new posts, follow changes) clear the cache explicitly; other
//! edits, deletions included, become visible once the entry expires.

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::PageKey;
pub use middleware::{PageCacheState, page_cache_layer};
pub use store::{
    CachedPage, Clock, ManualClock, NoopPageCache, PageCache, SystemClock, TtlPageCache,
};

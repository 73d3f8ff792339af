//! Home feed page cache.
//!
//! The rendered listing of the home page is stored per page number for a
//! short time-to-live. The cache is handed to the feed service as a trait
//! object, so tests and deployments can swap the backend:
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! max_entries = 64
//! ```

mod config;
mod keys;
mod lock;
mod store;

use std::sync::Arc;

pub use config::{CacheConfig, DEFAULT_INDEX_TTL, DEFAULT_MAX_ENTRIES};
pub use keys::{INDEX_PAGE_KEY, index_page_key};
pub use store::{CacheError, DisabledPageCache, MemoryPageCache, PageCache};

/// Build the cache backend selected by configuration.
pub fn build_page_cache(config: &CacheConfig) -> Arc<dyn PageCache> {
    if config.enabled {
        Arc::new(MemoryPageCache::new(config))
    } else {
        tracing::info!(target: "yatube::cache", "page cache disabled");
        Arc::new(DisabledPageCache)
    }
}

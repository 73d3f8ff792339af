//! Page cache storage.
//!
//! The home feed is rendered once and kept as an opaque blob for a short
//! window. Readers inside the window get the stored bytes even if the
//! underlying posts changed; an explicit clear drops the entry immediately.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Key/blob cache with per-entry time-to-live.
///
/// Callers treat every error as a miss: the cache may never fail a request.
#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, blob: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn clear(&self, key: &str) -> Result<(), CacheError>;

    async fn clear_all(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct Entry {
    blob: Bytes,
    expires_at: Instant,
}

/// In-process LRU page cache.
pub struct MemoryPageCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryPageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let now = Instant::now();

        let hit = match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.blob.clone()),
            Some(_) => {
                entries.pop(key);
                counter!("yatube_page_cache_expired_total").increment(1);
                None
            }
            None => None,
        };

        if hit.is_some() {
            counter!("yatube_page_cache_hit_total").increment(1);
        } else {
            counter!("yatube_page_cache_miss_total").increment(1);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, blob: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            blob,
            expires_at: Instant::now() + ttl,
        };
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!("yatube_page_cache_evict_total").increment(1);
        }
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "clear").pop(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "clear_all").clear();
        Ok(())
    }
}

/// Cache used when caching is switched off: stores nothing, always misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPageCache;

#[async_trait]
impl PageCache for DisabledPageCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _blob: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

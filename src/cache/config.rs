//! Page cache configuration.

use std::{num::NonZeroUsize, time::Duration};

pub const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_ENTRIES: usize = 64;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,
    /// Lifetime of a cached home-feed page.
    pub index_ttl: Duration,
    /// Upper bound on stored blobs; least recently used entries go first.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: DEFAULT_INDEX_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
            max_entries: settings.max_entries.get(),
        }
    }
}

impl CacheConfig {
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_home_feed_window() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.index_ttl, Duration::from_secs(20));
        assert_eq!(config.max_entries, 64);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert_eq!(config.max_entries_non_zero().get(), 1);
    }
}

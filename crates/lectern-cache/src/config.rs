//! Configuration for the bounded cache, the durable tier and the orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use lectern_types::config_defaults as defaults;
use lectern_types::{HasCacheConfig, HasTierConfig};

/// Configuration for a [`BoundedCache`](crate::BoundedCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries before LRU eviction.
    pub max_entries: usize,

    /// TTL applied when `set` is called without one.
    /// `None` means such entries never expire.
    pub default_ttl: Option<Duration>,

    /// Whether `start_sweeper` may spawn the periodic expiry sweep.
    /// If false, expired entries are only removed on access.
    pub enable_cleanup_task: bool,

    /// Interval for the expiry sweep (if enabled).
    pub cleanup_interval: Duration,

    /// How long `find_similar` results are memoised.
    pub similarity_memo_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            default_ttl: Some(defaults::cache_ttl()),
            enable_cleanup_task: true,
            cleanup_interval: defaults::cleanup_interval(),
            similarity_memo_ttl: Duration::from_secs(defaults::SIMILARITY_MEMO_SECS),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any configuration source exposing cache settings.
    pub fn from_provider(provider: &impl HasCacheConfig) -> Self {
        Self {
            max_entries: provider.max_entries(),
            default_ttl: provider.default_ttl(),
            enable_cleanup_task: true,
            cleanup_interval: provider.cleanup_interval(),
            similarity_memo_ttl: provider.similarity_memo_ttl(),
        }
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Entries set without a TTL never expire.
    pub fn without_default_ttl(mut self) -> Self {
        self.default_ttl = None;
        self
    }

    /// Enable or disable the background sweep.
    pub fn with_cleanup_task(mut self, enabled: bool) -> Self {
        self.enable_cleanup_task = enabled;
        self
    }

    /// Set the sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set how long similarity results are memoised.
    pub fn with_similarity_memo_ttl(mut self, ttl: Duration) -> Self {
        self.similarity_memo_ttl = ttl;
        self
    }

    /// Effective capacity (never zero).
    pub(crate) fn capacity(&self) -> usize {
        self.max_entries.max(1)
    }
}

/// Configuration for a [`FileCache`](crate::FileCache).
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    /// Backing file; `None` keeps the tier in memory only.
    pub path: Option<PathBuf>,

    /// Maximum number of entries.
    pub max_entries: usize,

    /// Interval between periodic flushes.
    pub flush_interval: Duration,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: defaults::TIER2_MAX_ENTRIES,
            flush_interval: defaults::flush_interval(),
        }
    }
}

impl FileCacheConfig {
    /// Create a configuration backed by `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Build from any configuration source exposing tier settings.
    pub fn from_provider(provider: &impl HasTierConfig) -> Self {
        Self {
            path: provider.path(),
            max_entries: provider.max_entries(),
            flush_interval: provider.flush_interval(),
        }
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

/// Configuration for a [`TieredCache`](crate::TieredCache).
#[derive(Debug, Clone)]
pub struct TieredConfig {
    /// TTL used by `set` when the caller gives none.
    pub default_ttl: Option<Duration>,

    /// TTL given to values promoted from Tier-2 into Tier-1.
    pub promotion_ttl: Option<Duration>,

    /// Upper bound on any single Tier-2 call.
    pub tier2_timeout: Duration,

    /// Concurrent loader calls during warmup.
    pub warmup_concurrency: usize,
}

impl Default for TieredConfig {
    fn default() -> Self {
        let default_ttl = defaults::cache_ttl();
        Self {
            default_ttl: Some(default_ttl),
            promotion_ttl: Some(default_ttl / 2),
            tier2_timeout: Duration::from_millis(defaults::TIER2_TIMEOUT_MS),
            warmup_concurrency: defaults::WARMUP_CONCURRENCY,
        }
    }
}

impl TieredConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the Tier-1 and Tier-2 configuration sources.
    ///
    /// Promotion TTL falls back to half the Tier-1 default TTL.
    pub fn from_providers(cache: &impl HasCacheConfig, tier: &impl HasTierConfig) -> Self {
        let default_ttl = cache.default_ttl();
        Self {
            default_ttl,
            promotion_ttl: tier.promotion_ttl().or(default_ttl.map(|ttl| ttl / 2)),
            tier2_timeout: tier.timeout(),
            warmup_concurrency: tier.warmup_concurrency(),
        }
    }

    /// Set the default TTL (promotion TTL becomes half of it).
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self.promotion_ttl = Some(ttl / 2);
        self
    }

    /// Set the promotion TTL explicitly.
    pub fn with_promotion_ttl(mut self, ttl: Duration) -> Self {
        self.promotion_ttl = Some(ttl);
        self
    }

    /// Set the Tier-2 timeout.
    pub fn with_tier2_timeout(mut self, timeout: Duration) -> Self {
        self.tier2_timeout = timeout;
        self
    }

    /// Set warmup concurrency.
    pub fn with_warmup_concurrency(mut self, concurrency: usize) -> Self {
        self.warmup_concurrency = concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_types::{CacheConfigProvider, TierConfigProvider};

    #[test]
    fn test_capacity_never_zero() {
        assert_eq!(CacheConfig::new().with_max_entries(0).capacity(), 1);
        assert_eq!(CacheConfig::new().with_max_entries(3).capacity(), 3);
    }

    #[test]
    fn test_promotion_ttl_defaults_to_half() {
        let cache = CacheConfigProvider {
            default_ttl: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        let config = TieredConfig::from_providers(&cache, &TierConfigProvider::default());
        assert_eq!(config.promotion_ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_explicit_promotion_ttl_wins() {
        let tier = TierConfigProvider {
            promotion_ttl: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let config = TieredConfig::from_providers(&CacheConfigProvider::default(), &tier);
        assert_eq!(config.promotion_ttl, Some(Duration::from_secs(5)));
    }
}

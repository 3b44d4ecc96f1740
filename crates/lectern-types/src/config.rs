//! Configuration traits for decoupled config passing between crates.
//!
//! These traits allow components to depend on configuration capabilities without
//! requiring direct knowledge of the full configuration structure. Each trait
//! represents a specific configuration capability.

use std::path::PathBuf;
use std::time::Duration;

/// Base trait for all configuration types.
///
/// Implementations should be cheaply cloneable and thread-safe.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// Session registry configuration.
pub trait HasSessionConfig: ConfigProvider {
    /// Maximum number of sessions the registry will hold at once.
    fn max_sessions(&self) -> usize;

    /// Number of digits in a join code.
    fn code_length(&self) -> usize {
        defaults::CODE_LENGTH
    }

    /// How many random codes to try before giving up.
    fn max_code_attempts(&self) -> usize {
        defaults::MAX_CODE_ATTEMPTS
    }

    /// Lifetime of a session when the creator does not specify one.
    fn default_session_ttl(&self) -> Duration;

    /// Participant capacity of a session when the creator does not specify one.
    fn default_max_participants(&self) -> usize {
        defaults::MAX_PARTICIPANTS
    }

    /// Interval between reaper runs.
    fn cleanup_interval(&self) -> Duration;
}

/// Bounded (Tier-1) cache configuration.
pub trait HasCacheConfig: ConfigProvider {
    /// Maximum number of live entries before LRU eviction.
    fn max_entries(&self) -> usize;

    /// TTL applied when `set` is called without one (None = no expiry).
    fn default_ttl(&self) -> Option<Duration>;

    /// Interval between expiry sweeps.
    fn cleanup_interval(&self) -> Duration;

    /// How long similarity lookups are memoised.
    fn similarity_memo_ttl(&self) -> Duration {
        Duration::from_secs(defaults::SIMILARITY_MEMO_SECS)
    }
}

/// Durable (Tier-2) cache and orchestrator configuration.
pub trait HasTierConfig: ConfigProvider {
    /// File backing the durable tier (None = in-memory only).
    fn path(&self) -> Option<PathBuf>;

    /// Maximum number of entries held by the durable tier.
    fn max_entries(&self) -> usize;

    /// Interval between flushes of the durable tier.
    fn flush_interval(&self) -> Duration;

    /// Upper bound on any single Tier-2 operation.
    fn timeout(&self) -> Duration {
        Duration::from_millis(defaults::TIER2_TIMEOUT_MS)
    }

    /// Concurrent loader calls during warmup.
    fn warmup_concurrency(&self) -> usize {
        defaults::WARMUP_CONCURRENCY
    }

    /// TTL given to values promoted from Tier-2 (None = half the Tier-1 default).
    fn promotion_ttl(&self) -> Option<Duration> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Default values
// ─────────────────────────────────────────────────────────────────────────────

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    pub const MAX_SESSIONS: usize = 1_000;
    pub const CODE_LENGTH: usize = 6;
    pub const MAX_CODE_ATTEMPTS: usize = 100;
    pub const SESSION_TTL_SECS: u64 = 2 * 60 * 60;
    pub const MAX_PARTICIPANTS: usize = 100;
    pub const CLEANUP_INTERVAL_SECS: u64 = 60;
    pub const CACHE_MAX_ENTRIES: usize = 1_000;
    pub const CACHE_TTL_SECS: u64 = 60 * 60;
    pub const SIMILARITY_MEMO_SECS: u64 = 60;
    pub const TIER2_MAX_ENTRIES: usize = 10_000;
    pub const FLUSH_INTERVAL_SECS: u64 = 30;
    pub const TIER2_TIMEOUT_MS: u64 = 250;
    pub const WARMUP_CONCURRENCY: usize = 8;

    pub fn cleanup_interval() -> Duration {
        Duration::from_secs(CLEANUP_INTERVAL_SECS)
    }

    pub fn session_ttl() -> Duration {
        Duration::from_secs(SESSION_TTL_SECS)
    }

    pub fn cache_ttl() -> Duration {
        Duration::from_secs(CACHE_TTL_SECS)
    }

    pub fn flush_interval() -> Duration {
        Duration::from_secs(FLUSH_INTERVAL_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simple wrapper types for standalone config passing
// ─────────────────────────────────────────────────────────────────────────────

/// Standalone session registry configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigProvider {
    pub max_sessions: usize,
    pub code_length: usize,
    pub max_code_attempts: usize,
    pub default_session_ttl: Duration,
    pub default_max_participants: usize,
    pub cleanup_interval: Duration,
}

impl Default for SessionConfigProvider {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            code_length: defaults::CODE_LENGTH,
            max_code_attempts: defaults::MAX_CODE_ATTEMPTS,
            default_session_ttl: defaults::session_ttl(),
            default_max_participants: defaults::MAX_PARTICIPANTS,
            cleanup_interval: defaults::cleanup_interval(),
        }
    }
}

impl ConfigProvider for SessionConfigProvider {}

impl HasSessionConfig for SessionConfigProvider {
    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn code_length(&self) -> usize {
        self.code_length
    }

    fn max_code_attempts(&self) -> usize {
        self.max_code_attempts
    }

    fn default_session_ttl(&self) -> Duration {
        self.default_session_ttl
    }

    fn default_max_participants(&self) -> usize {
        self.default_max_participants
    }

    fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }
}

/// Standalone bounded cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfigProvider {
    pub max_entries: usize,
    pub default_ttl: Option<Duration>,
    pub cleanup_interval: Duration,
    pub similarity_memo_ttl: Duration,
}

impl Default for CacheConfigProvider {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            default_ttl: Some(defaults::cache_ttl()),
            cleanup_interval: defaults::cleanup_interval(),
            similarity_memo_ttl: Duration::from_secs(defaults::SIMILARITY_MEMO_SECS),
        }
    }
}

impl ConfigProvider for CacheConfigProvider {}

impl HasCacheConfig for CacheConfigProvider {
    fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    fn similarity_memo_ttl(&self) -> Duration {
        self.similarity_memo_ttl
    }
}

/// Standalone durable tier configuration.
#[derive(Debug, Clone)]
pub struct TierConfigProvider {
    pub path: Option<PathBuf>,
    pub max_entries: usize,
    pub flush_interval: Duration,
    pub timeout: Duration,
    pub warmup_concurrency: usize,
    pub promotion_ttl: Option<Duration>,
}

impl Default for TierConfigProvider {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: defaults::TIER2_MAX_ENTRIES,
            flush_interval: defaults::flush_interval(),
            timeout: Duration::from_millis(defaults::TIER2_TIMEOUT_MS),
            warmup_concurrency: defaults::WARMUP_CONCURRENCY,
            promotion_ttl: None,
        }
    }
}

impl ConfigProvider for TierConfigProvider {}

impl HasTierConfig for TierConfigProvider {
    fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn warmup_concurrency(&self) -> usize {
        self.warmup_concurrency
    }

    fn promotion_ttl(&self) -> Option<Duration> {
        self.promotion_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfigProvider::default();
        assert_eq!(config.max_sessions(), defaults::MAX_SESSIONS);
        assert_eq!(config.code_length(), 6);
        assert_eq!(config.max_code_attempts(), 100);
        assert_eq!(config.cleanup_interval(), defaults::cleanup_interval());
        assert_eq!(config.default_session_ttl(), Duration::from_secs(7200));
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfigProvider::default();
        assert_eq!(config.max_entries(), defaults::CACHE_MAX_ENTRIES);
        assert_eq!(config.default_ttl(), Some(defaults::cache_ttl()));
        assert_eq!(config.similarity_memo_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_tier_config_defaults() {
        let config = TierConfigProvider::default();
        assert!(config.path().is_none());
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.warmup_concurrency(), 8);
        assert!(config.promotion_ttl().is_none());
    }

    #[test]
    fn test_custom_session_config() {
        let config = SessionConfigProvider {
            max_sessions: 5,
            code_length: 4,
            cleanup_interval: Duration::from_secs(120),
            ..Default::default()
        };
        assert_eq!(config.max_sessions(), 5);
        assert_eq!(config.code_length(), 4);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(120));
        assert_eq!(config.default_max_participants(), defaults::MAX_PARTICIPANTS);
    }
}

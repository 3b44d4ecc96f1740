//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]   # session registry
//! [cache]     # bounded Tier-1 cache
//! [tier2]     # durable Tier-2 cache and orchestrator
//! [logging]   # log level, format and optional file output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use lectern_types::config_defaults as defaults;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged. Absent sections resolve to defaults
/// through the accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LecternConfig {
    /// Session registry configuration.
    pub session: Option<SessionConfig>,

    /// Tier-1 cache configuration.
    pub cache: Option<CacheConfig>,

    /// Tier-2 cache configuration.
    pub tier2: Option<Tier2Config>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl LecternConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per section: a section present in `other` replaces the
    /// whole section here.
    pub fn merge(&mut self, other: LecternConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.cache.is_some() {
            self.cache = other.cache;
        }

        if other.tier2.is_some() {
            self.tier2 = other.tier2;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Session settings, defaulted when the section is absent.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Tier-1 cache settings, defaulted when the section is absent.
    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    /// Tier-2 settings, defaulted when the section is absent.
    pub fn tier2(&self) -> Tier2Config {
        self.tier2.clone().unwrap_or_default()
    }

    /// Logging settings, defaulted when the section is absent.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Same config with every section filled in, for display.
    pub fn resolved(&self) -> Self {
        Self {
            session: Some(self.session()),
            cache: Some(self.cache()),
            tier2: Some(self.tier2()),
            logging: Some(self.logging()),
        }
    }

    /// Human-readable notes about settings that will be adjusted or are
    /// likely mistakes. Never fails; the components clamp what they must.
    pub fn lint(&self) -> Vec<String> {
        let mut notes = Vec::new();
        let session = self.session();

        if !(1..=18).contains(&session.code_length) {
            notes.push(format!(
                "[session] code_length = {} is outside 1..=18 and will be clamped",
                session.code_length
            ));
        }
        let code_space = 10u128.saturating_pow(session.code_length.clamp(1, 18) as u32);
        if (session.max_sessions as u128).saturating_mul(2) > code_space {
            notes.push(format!(
                "[session] max_sessions = {} fills more than half of the {}-digit code space",
                session.max_sessions, session.code_length
            ));
        }
        if session.default_ttl_secs == 0 {
            notes.push("[session] default_ttl_secs = 0 makes sessions unusable".to_string());
        }
        if self.cache().max_entries == 0 {
            notes.push("[cache] max_entries = 0 is treated as 1".to_string());
        }
        if self.tier2().timeout_ms == 0 {
            notes.push("[tier2] timeout_ms = 0 makes every Tier-2 call time out".to_string());
        }

        notes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session registry configuration section.
///
/// ```toml
/// [session]
/// max_sessions = 1000
/// code_length = 6
/// default_ttl_secs = 7200
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of sessions held at once.
    pub max_sessions: usize,
    /// Digits in a join code.
    pub code_length: usize,
    /// Random codes tried per allocation.
    pub max_code_attempts: usize,
    /// Session lifetime when the creator gives none.
    pub default_ttl_secs: u64,
    /// Participant capacity when the creator gives none.
    pub default_max_participants: usize,
    /// Interval in seconds between reaper runs.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            code_length: defaults::CODE_LENGTH,
            max_code_attempts: defaults::MAX_CODE_ATTEMPTS,
            default_ttl_secs: defaults::SESSION_TTL_SECS,
            default_max_participants: defaults::MAX_PARTICIPANTS,
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
        }
    }
}

impl lectern_types::ConfigProvider for SessionConfig {}

impl lectern_types::HasSessionConfig for SessionConfig {
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
        Duration::from_secs(self.default_ttl_secs)
    }

    fn default_max_participants(&self) -> usize {
        self.default_max_participants
    }

    fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tier-1 cache configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries before LRU eviction.
    pub max_entries: usize,
    /// TTL for entries set without one. `0` means no expiry.
    pub default_ttl_secs: u64,
    /// Interval in seconds between expiry sweeps.
    pub cleanup_interval_secs: u64,
    /// How long similarity lookups are memoised.
    pub similarity_memo_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            default_ttl_secs: defaults::CACHE_TTL_SECS,
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
            similarity_memo_secs: defaults::SIMILARITY_MEMO_SECS,
        }
    }
}

impl lectern_types::ConfigProvider for CacheConfig {}

impl lectern_types::HasCacheConfig for CacheConfig {
    fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_secs > 0).then(|| Duration::from_secs(self.default_ttl_secs))
    }

    fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    fn similarity_memo_ttl(&self) -> Duration {
        Duration::from_secs(self.similarity_memo_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tier-2 Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tier-2 cache and orchestrator configuration section.
///
/// ```toml
/// [tier2]
/// path = "/var/lib/lectern/cache.json"
/// max_entries = 10000
/// timeout_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tier2Config {
    /// JSON file backing the tier. Absent means in-memory only.
    pub path: Option<PathBuf>,
    /// Maximum number of entries held.
    pub max_entries: usize,
    /// Interval in seconds between flushes to `path`.
    pub flush_interval_secs: u64,
    /// Upper bound in milliseconds on any single Tier-2 call.
    pub timeout_ms: u64,
    /// Concurrent loader calls during warmup.
    pub warmup_concurrency: usize,
    /// TTL for values promoted into Tier-1. Absent means half the Tier-1 default.
    pub promotion_ttl_secs: Option<u64>,
}

impl Default for Tier2Config {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: defaults::TIER2_MAX_ENTRIES,
            flush_interval_secs: defaults::FLUSH_INTERVAL_SECS,
            timeout_ms: defaults::TIER2_TIMEOUT_MS,
            warmup_concurrency: defaults::WARMUP_CONCURRENCY,
            promotion_ttl_secs: None,
        }
    }
}

impl lectern_types::ConfigProvider for Tier2Config {}

impl lectern_types::HasTierConfig for Tier2Config {
    fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn warmup_concurrency(&self) -> usize {
        self.warmup_concurrency
    }

    fn promotion_ttl(&self) -> Option<Duration> {
        self.promotion_ttl_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit console logs as JSON.
    pub json: bool,
    /// Directory for daily-rotated log files. Absent disables file logging.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

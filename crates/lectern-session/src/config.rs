//! Configuration for the session registry.

use std::time::Duration;

use lectern_types::HasSessionConfig;
use lectern_types::config_defaults as defaults;

/// Configuration for a [`SessionRegistry`](crate::SessionRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of sessions held at once (expired-but-unswept included).
    pub max_sessions: usize,

    /// Digits in a join code.
    pub code_length: usize,

    /// Random codes tried per allocation before giving up.
    pub max_code_attempts: usize,

    /// Lifetime of a session created without an explicit TTL.
    pub default_ttl: Duration,

    /// Participant capacity of a session created without an explicit one.
    pub default_max_participants: usize,

    /// Whether `start_reaper` may spawn the background reaper.
    pub enable_cleanup_task: bool,

    /// Interval between reaper runs.
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            code_length: defaults::CODE_LENGTH,
            max_code_attempts: defaults::MAX_CODE_ATTEMPTS,
            default_ttl: defaults::session_ttl(),
            default_max_participants: defaults::MAX_PARTICIPANTS,
            enable_cleanup_task: true,
            cleanup_interval: defaults::cleanup_interval(),
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any configuration source exposing session settings.
    pub fn from_provider(provider: &impl HasSessionConfig) -> Self {
        Self {
            max_sessions: provider.max_sessions(),
            code_length: provider.code_length(),
            max_code_attempts: provider.max_code_attempts(),
            default_ttl: provider.default_session_ttl(),
            default_max_participants: provider.default_max_participants(),
            enable_cleanup_task: true,
            cleanup_interval: provider.cleanup_interval(),
        }
    }

    /// Set the maximum number of sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the join code length.
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    /// Set the allocation retry budget.
    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts;
        self
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default participant capacity.
    pub fn with_default_max_participants(mut self, max: usize) -> Self {
        self.default_max_participants = max;
        self
    }

    /// Enable or disable the background reaper.
    pub fn with_cleanup_task(mut self, enabled: bool) -> Self {
        self.enable_cleanup_task = enabled;
        self
    }

    /// Set the reaper interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

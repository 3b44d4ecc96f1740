//! Shared contracts for the Lectern session and cache core.
//!
//! - [`Clock`] abstracts "now" so registries and caches can be driven by a
//!   [`ManualClock`] in tests instead of sleeping.
//! - The `Has*Config` traits let each component take configuration without
//!   depending on the full TOML schema.
//! - [`PeriodicTask`] runs the reaper/sweeper/flusher loops and makes
//!   stopping them idempotent.

pub mod clock;
pub mod config;
pub mod task;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, add_duration, elapsed_between};
pub use config::{
    CacheConfigProvider, ConfigProvider, HasCacheConfig, HasSessionConfig, HasTierConfig,
    SessionConfigProvider, TierConfigProvider, defaults as config_defaults,
};
pub use task::PeriodicTask;

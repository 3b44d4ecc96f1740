//! Service wiring: one registry and one tiered cache per process.

use std::sync::Arc;

use anyhow::Result;
use lectern_cache::{BoundedCache, FileCache, FileCacheConfig, TieredCache, TieredConfig};
use lectern_config::LecternConfig;
use lectern_session::{RegistryConfig, SessionRegistry};
use serde_json::Value;
use tracing::{debug, info};

/// Long-lived components built from configuration.
///
/// Background tasks (reaper, sweeper, flusher) start in [`init`](Self::init)
/// and end in [`stop`](Self::stop).
pub struct Services {
    pub registry: SessionRegistry,
    /// Tier-1, also reachable through `cache` but kept for similarity lookups.
    pub tier1: BoundedCache<Value>,
    pub tier2: FileCache<Value>,
    pub cache: TieredCache<Value>,
}

impl Services {
    /// Build every component and start its background task.
    pub async fn init(config: &LecternConfig) -> Self {
        let session = config.session();
        let cache_config = config.cache();
        let tier_config = config.tier2();

        let registry = SessionRegistry::new(RegistryConfig::from_provider(&session));
        let tier1 = BoundedCache::new(lectern_cache::CacheConfig::from_provider(&cache_config));
        let tier2 = FileCache::open(FileCacheConfig::from_provider(&tier_config)).await;
        let cache = TieredCache::new(
            Arc::new(tier1.clone()),
            Arc::new(tier2.clone()),
            TieredConfig::from_providers(&cache_config, &tier_config),
        );

        let reaper = registry.start_reaper();
        let sweeper = tier1.start_sweeper();
        let flusher = tier2.start_flusher();
        debug!(reaper, sweeper, flusher, "Background tasks started");

        info!(
            max_sessions = session.max_sessions,
            tier1_capacity = tier1.capacity(),
            tier2_path = ?tier2.path(),
            "Services initialised"
        );

        Self {
            registry,
            tier1,
            tier2,
            cache,
        }
    }

    /// Stop background tasks, flush Tier-2 and drop all sessions.
    pub async fn stop(&self) -> Result<()> {
        self.registry.stop();
        self.tier1.stop();
        self.tier2.shutdown().await?;
        info!("Services stopped");
        Ok(())
    }
}

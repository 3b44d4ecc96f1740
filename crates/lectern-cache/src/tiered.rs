//! Two-tier cache orchestrator.
//!
//! Reads go to Tier-1 first and fall back to Tier-2, promoting Tier-2 hits
//! into Tier-1. Writes always land in Tier-1; Tier-2 is best effort and every
//! Tier-2 call is bounded by a timeout, so a slow or failing Tier-2 degrades
//! the orchestrator to Tier-1-only behavior instead of blocking it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::backend::{CacheBackend, TierStats};
use crate::config::TieredConfig;
use crate::error::{CacheError, Result};

/// Options for [`TieredCache::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredSetOptions {
    /// TTL for this value; `None` uses the configured default.
    pub ttl: Option<Duration>,

    /// Skip the Tier-2 write.
    pub tier1_only: bool,
}

impl TieredSetOptions {
    /// Options with only a TTL.
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            tier1_only: false,
        }
    }

    /// Only write Tier-1.
    pub fn tier1_only() -> Self {
        Self {
            ttl: None,
            tier1_only: true,
        }
    }
}

/// Outcome of [`TieredCache::warmup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    /// Keys loaded and stored.
    pub loaded: usize,

    /// Keys already cached.
    pub skipped: usize,

    /// Keys whose loader or store failed.
    pub failed: usize,
}

/// Combined statistics for both tiers.
#[derive(Debug, Clone, Serialize)]
pub struct TieredStats {
    /// Tier-1 counters, `None` if Tier-1 could not report.
    pub tier1: Option<TierStats>,

    /// Tier-2 counters, `None` if Tier-2 could not report.
    pub tier2: Option<TierStats>,

    /// Orchestrator reads served by Tier-1.
    pub tier1_hits: u64,

    /// Orchestrator reads served by Tier-2 (and promoted).
    pub tier2_hits: u64,

    /// Orchestrator reads served by neither tier.
    pub misses: u64,

    /// All orchestrator reads.
    pub total_requests: u64,

    /// Tier-2 calls that failed or timed out.
    pub tier2_errors: u64,

    /// `(tier1_hits + tier2_hits) / total_requests`, or 0 with no reads.
    pub overall_hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    tier1_hits: AtomicU64,
    tier2_hits: AtomicU64,
    misses: AtomicU64,
    total_requests: AtomicU64,
    tier2_errors: AtomicU64,
}

/// Fast Tier-1 plus durable Tier-2 behind one read/write API.
pub struct TieredCache<V> {
    tier1: Arc<dyn CacheBackend<V>>,
    tier2: Arc<dyn CacheBackend<V>>,
    config: TieredConfig,
    counters: Arc<Counters>,
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Compose two tiers.
    pub fn new(
        tier1: Arc<dyn CacheBackend<V>>,
        tier2: Arc<dyn CacheBackend<V>>,
        config: TieredConfig,
    ) -> Self {
        Self {
            tier1,
            tier2,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get the orchestrator configuration.
    pub fn config(&self) -> &TieredConfig {
        &self.config
    }

    /// The fast tier.
    pub fn tier1(&self) -> &Arc<dyn CacheBackend<V>> {
        &self.tier1
    }

    /// The durable tier.
    pub fn tier2(&self) -> &Arc<dyn CacheBackend<V>> {
        &self.tier2
    }

    /// Run a Tier-2 call under the configured timeout, counting failures.
    async fn tier2_call<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.tier2_timeout;
        let result = match tokio::time::timeout(timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(timeout)),
        };
        if result.is_err() {
            self.counters.tier2_errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Look up a value, promoting Tier-2 hits into Tier-1.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.tier1.get(key).await {
            Ok(Some(value)) => {
                self.counters.tier1_hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Tier-1 hit");
                return Some(value);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, tier = self.tier1.name(), error = %e, "Tier-1 lookup failed");
            }
        }

        match self.tier2_call(self.tier2.get_with_ttl(key)).await {
            Ok(Some((value, remaining))) => {
                self.counters.tier2_hits.fetch_add(1, Ordering::Relaxed);
                let ttl = promotion_ttl(self.config.promotion_ttl, remaining);
                match self.tier1.set(key, value.clone(), ttl).await {
                    Ok(()) => debug!(key = %key, "Promoted Tier-2 hit into Tier-1"),
                    Err(e) => warn!(key = %key, error = %e, "Failed to promote into Tier-1"),
                }
                Some(value)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    tier = self.tier2.name(),
                    error = %e,
                    "Tier-2 lookup failed, serving from Tier-1 only"
                );
                None
            }
        }
    }

    /// Store a value in Tier-1 and, unless `tier1_only`, in Tier-2.
    ///
    /// Only a Tier-1 failure is returned; Tier-2 failures are logged.
    pub async fn set(&self, key: &str, value: V, options: TieredSetOptions) -> Result<()> {
        let ttl = options.ttl.or(self.config.default_ttl);

        if options.tier1_only {
            return self.tier1.set(key, value, ttl).await;
        }

        self.tier1.set(key, value.clone(), ttl).await?;
        if let Err(e) = self.tier2_call(self.tier2.set(key, value, ttl)).await {
            warn!(
                key = %key,
                tier = self.tier2.name(),
                error = %e,
                "Tier-2 write failed, value cached in Tier-1 only"
            );
        }
        Ok(())
    }

    /// Remove a key from both tiers. Returns whether either tier had it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.tier1.delete(key).await?;
        match self.tier2_call(self.tier2.delete(key)).await {
            Ok(removed_tier2) => Ok(removed || removed_tier2),
            Err(e) => {
                warn!(key = %key, tier = self.tier2.name(), error = %e, "Tier-2 delete failed");
                Ok(removed)
            }
        }
    }

    /// Whether either tier holds a live value for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        if matches!(self.tier1.contains(key).await, Ok(true)) {
            return true;
        }
        matches!(self.tier2_call(self.tier2.contains(key)).await, Ok(true))
    }

    /// Empty both tiers. Tier-2 failures are logged.
    pub async fn clear(&self) -> Result<()> {
        self.tier1.clear().await?;
        if let Err(e) = self.tier2_call(self.tier2.clear()).await {
            warn!(tier = self.tier2.name(), error = %e, "Tier-2 clear failed");
        }
        Ok(())
    }

    /// Load every key not already cached, with bounded concurrency.
    ///
    /// A failing loader only affects its own key.
    pub async fn warmup<I, F, Fut, E>(&self, keys: I, loader: F) -> WarmupReport
    where
        I: IntoIterator<Item = String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: std::fmt::Display,
    {
        let loaded = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let (loaded_ref, skipped_ref, failed_ref) = (&loaded, &skipped, &failed);
        let loader = &loader;
        let limit = self.config.warmup_concurrency.max(1);

        stream::iter(keys)
            .for_each_concurrent(limit, move |key| async move {
                if self.contains(&key).await {
                    skipped_ref.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                match loader(key.clone()).await {
                    Ok(value) => match self.set(&key, value, TieredSetOptions::default()).await {
                        Ok(()) => {
                            loaded_ref.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed_ref.fetch_add(1, Ordering::Relaxed);
                            warn!(key = %key, error = %e, "Warmup store failed");
                        }
                    },
                    Err(e) => {
                        failed_ref.fetch_add(1, Ordering::Relaxed);
                        warn!(key = %key, error = %e, "Warmup loader failed");
                    }
                }
            })
            .await;

        let report = WarmupReport {
            loaded: loaded.into_inner(),
            skipped: skipped.into_inner(),
            failed: failed.into_inner(),
        };
        debug!(?report, "Cache warmup finished");
        report
    }

    /// Statistics for both tiers plus orchestrator counters.
    pub async fn stats(&self) -> TieredStats {
        let tier1 = match self.tier1.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(tier = self.tier1.name(), error = %e, "Tier-1 stats unavailable");
                None
            }
        };
        let tier2 = self.tier2_call(self.tier2.stats()).await.ok();

        let tier1_hits = self.counters.tier1_hits.load(Ordering::Relaxed);
        let tier2_hits = self.counters.tier2_hits.load(Ordering::Relaxed);
        let total_requests = self.counters.total_requests.load(Ordering::Relaxed);
        let overall_hit_rate = if total_requests == 0 {
            0.0
        } else {
            (tier1_hits + tier2_hits) as f64 / total_requests as f64
        };

        TieredStats {
            tier1,
            tier2,
            tier1_hits,
            tier2_hits,
            misses: self.counters.misses.load(Ordering::Relaxed),
            total_requests,
            tier2_errors: self.counters.tier2_errors.load(Ordering::Relaxed),
            overall_hit_rate,
        }
    }
}

/// A promoted value never outlives its Tier-2 expiry.
fn promotion_ttl(configured: Option<Duration>, remaining: Option<Duration>) -> Option<Duration> {
    match (configured, remaining) {
        (Some(configured), Some(remaining)) => Some(configured.min(remaining)),
        (None, remaining) => remaining,
        (configured, None) => configured,
    }
}

impl<V> Clone for TieredCache<V> {
    fn clone(&self) -> Self {
        Self {
            tier1: Arc::clone(&self.tier1),
            tier2: Arc::clone(&self.tier2),
            config: self.config.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

//! The contract shared by every cache tier.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Snapshot of a single tier's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierStats {
    /// Backend name (for logs and stats output).
    pub name: String,

    /// Live entries.
    pub entries: usize,

    /// Configured capacity.
    pub capacity: usize,

    /// Lookups that found a live entry.
    pub hits: u64,

    /// Lookups that found nothing or an expired entry.
    pub misses: u64,

    /// `hits / (hits + misses)`, or 0 with no lookups.
    pub hit_rate: f64,
}

impl TierStats {
    pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// A cache tier usable by [`TieredCache`](crate::TieredCache).
///
/// Implemented by the in-memory [`BoundedCache`](crate::BoundedCache) and the
/// durable [`FileCache`](crate::FileCache); other backends (e.g. a remote
/// key-value store) only need to implement this trait.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Look up a live value.
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Look up a live value together with its remaining TTL.
    ///
    /// The TTL is `None` when the entry never expires or the backend does not
    /// track expiry.
    async fn get_with_ttl(&self, key: &str) -> Result<Option<(V, Option<Duration>)>> {
        Ok(self.get(key).await?.map(|value| (value, None)))
    }

    /// Store a value; `ttl = None` uses the backend's default.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key. Returns whether it was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether a live value exists, without counting as an access.
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Counter snapshot.
    async fn stats(&self) -> Result<TierStats>;
}

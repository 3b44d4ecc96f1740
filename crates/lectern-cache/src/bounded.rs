//! Bounded cache with LRU eviction and TTL support.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lectern_types::{PeriodicTask, SharedClock, SystemClock, add_duration, elapsed_between};
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::backend::{CacheBackend, TierStats};
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, SetOptions, SimilarEntry};
use crate::error::Result;
use crate::similarity::{jaccard, tokenize};

/// Number of keys reported in `hottest_keys` / `most_recent_keys`.
const TOP_KEYS: usize = 5;

/// Upper bound on memoised similarity queries.
const MAX_MEMO_ENTRIES: usize = 256;

/// Rough per-entry bookkeeping cost (list links, map slot, key header).
const ENTRY_OVERHEAD_BYTES: usize = 64;

/// Memoised `find_similar` result: matching keys and their scores.
struct MemoEntry {
    computed_at: DateTime<Utc>,
    matches: Vec<(String, f64)>,
}

/// Inner state protected by a single mutex.
///
/// Every read reorders the recency list, so reads take the lock exclusively.
struct CacheInner<V> {
    /// Entries in recency order (most recent first). Capacity is enforced
    /// by `set`, not by the `LruCache` itself, so evictions can be counted.
    lru: LruCache<String, CacheEntry<V>>,

    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,

    /// Cumulative lookup latency and sample count.
    access_time: Duration,
    access_samples: u64,

    similarity_memo: HashMap<(String, u64), MemoEntry>,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            access_time: Duration::ZERO,
            access_samples: 0,
            similarity_memo: HashMap::new(),
        }
    }

    /// Remove `key` if it is expired. Returns whether it was removed.
    fn purge_if_expired(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let expired = self.lru.peek(key).is_some_and(|e| e.is_expired(now));
        if expired {
            self.lru.pop(key);
            self.expirations += 1;
            debug!(key = %key, "Expired cache entry removed on access");
        }
        expired
    }

    /// Remove every expired entry. Returns how many were removed.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.lru.pop(key);
        }

        let count = expired.len();
        self.expirations += count as u64;
        count
    }

    fn remove_matching(&mut self, matches: impl Fn(&str, &CacheEntry<V>) -> bool) -> usize {
        let doomed: Vec<String> = self
            .lru
            .iter()
            .filter(|(key, entry)| matches(key, entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.lru.pop(key);
        }
        if !doomed.is_empty() {
            self.similarity_memo.clear();
        }
        doomed.len()
    }

    fn record_latency(&mut self, elapsed: Duration) {
        self.access_time += elapsed;
        self.access_samples += 1;
    }
}

/// Bounded cache with LRU eviction and optional TTL.
///
/// This cache provides:
/// - LRU eviction when max capacity is reached
/// - Per-entry TTL, purged eagerly when a stale entry is read
/// - Pattern and tag invalidation
/// - Token-overlap similarity lookup over keys
/// - Hit/miss/latency statistics
///
/// Cloning the cache yields another handle to the same entries.
pub struct BoundedCache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    config: CacheConfig,
    clock: SharedClock,
    sweeper: Arc<PeriodicTask>,
}

impl<V> BoundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache driven by the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Create a cache driven by the given clock.
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::new())),
            config,
            clock,
            sweeper: Arc::new(PeriodicTask::new()),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Maximum number of live entries.
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Current number of stored entries (expired ones included until purged).
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Get a value, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Get a full entry, marking it most recently used.
    ///
    /// An expired entry counts as a miss and is removed immediately.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        inner.purge_if_expired(key, now);
        let found = inner.lru.get_mut(key).map(|entry| {
            entry.record_access(now);
            entry.clone()
        });

        if found.is_some() {
            inner.hits += 1;
            trace!(key = %key, "Cache hit");
        } else {
            inner.misses += 1;
            trace!(key = %key, "Cache miss");
        }
        inner.record_latency(started.elapsed());
        found
    }

    /// Insert or update a value.
    ///
    /// An existing key is updated in place and becomes most recently used.
    /// A new key first evicts least recently used entries until there is room.
    pub fn set(&self, key: impl Into<String>, value: V, options: SetOptions) {
        let key = key.into();
        let now = self.clock.now();
        let expires_at = options
            .ttl
            .or(self.config.default_ttl)
            .map(|ttl| add_duration(now, ttl));

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.lru.get_mut(&key) {
            entry.value = value;
            entry.expires_at = expires_at;
            entry.tags = options.tags;
            entry.metadata = options.metadata;
            entry.last_accessed = now;
            trace!(key = %key, "Cache entry updated");
            return;
        }

        let capacity = self.config.capacity();
        while inner.lru.len() >= capacity {
            match inner.lru.pop_lru() {
                Some((evicted, _)) => {
                    inner.evictions += 1;
                    debug!(key = %evicted, "Evicting LRU entry to make room");
                }
                None => break,
            }
        }

        let mut entry = CacheEntry::new(key.clone(), value, now, expires_at);
        entry.tags = options.tags;
        entry.metadata = options.metadata;
        inner.lru.put(key, entry);

        trace!(cache_size = inner.lru.len(), "Cache entry inserted");
    }

    /// Check whether a live entry exists, without touching recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        !inner.purge_if_expired(key, now) && inner.lru.contains(key)
    }

    /// Mark an entry most recently used without reading it.
    ///
    /// Returns `false` if the key is absent or expired.
    pub fn touch(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.purge_if_expired(key, now) {
            return false;
        }
        match inner.lru.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = now;
                true
            }
            None => false,
        }
    }

    /// Peek at a live value without updating recency or statistics.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .lru
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.lock().lru.pop(key).is_some();
        if removed {
            debug!(key = %key, "Cache entry deleted");
        }
        removed
    }

    /// Live keys, most recently used first, optionally filtered by a regex.
    pub fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let regex = pattern.map(Regex::new).transpose()?;
        let now = self.clock.now();
        let inner = self.inner.lock();
        Ok(inner
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .filter(|(key, _)| regex.as_ref().is_none_or(|re| re.is_match(key)))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Remove every key matching a regex. Returns the number removed.
    pub fn invalidate(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        let count = self
            .inner
            .lock()
            .remove_matching(|key, _| regex.is_match(key));
        debug!(pattern = %pattern, count, "Invalidated cache entries by pattern");
        Ok(count)
    }

    /// Remove every entry carrying `tag`. Returns the number removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let count = self
            .inner
            .lock()
            .remove_matching(|_, entry| entry.has_tag(tag));
        debug!(tag = %tag, count, "Invalidated cache entries by tag");
        count
    }

    /// Remove every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.lru.len();
        inner.lru.clear();
        inner.similarity_memo.clear();
        debug!(count, "Cache cleared");
    }

    /// Entries whose key is at least `threshold` similar to `query`,
    /// most similar first.
    ///
    /// Matching keys are memoised per `(query, threshold)` for the
    /// configured window; values are always read fresh.
    pub fn find_similar(&self, query: &str, threshold: f64) -> Vec<SimilarEntry<V>> {
        let now = self.clock.now();
        let memo_ttl = self.config.similarity_memo_ttl;
        let memo_key = (query.to_string(), threshold.to_bits());

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let fresh = inner
            .similarity_memo
            .get(&memo_key)
            .filter(|memo| elapsed_between(memo.computed_at, now) < memo_ttl)
            .map(|memo| memo.matches.clone());

        let matches = match fresh {
            Some(matches) => {
                trace!(query = %query, "Similarity memo hit");
                matches
            }
            None => {
                let query_tokens = tokenize(query);
                let mut matches: Vec<(String, f64)> = inner
                    .lru
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired(now))
                    .map(|(key, _)| (key.clone(), jaccard(&query_tokens, &tokenize(key))))
                    .filter(|(_, score)| *score >= threshold)
                    .collect();
                matches.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

                if inner.similarity_memo.len() >= MAX_MEMO_ENTRIES {
                    inner
                        .similarity_memo
                        .retain(|_, memo| elapsed_between(memo.computed_at, now) < memo_ttl);
                    if inner.similarity_memo.len() >= MAX_MEMO_ENTRIES {
                        inner.similarity_memo.clear();
                    }
                }
                inner.similarity_memo.insert(
                    memo_key,
                    MemoEntry {
                        computed_at: now,
                        matches: matches.clone(),
                    },
                );
                matches
            }
        };

        matches
            .into_iter()
            .filter_map(|(key, similarity)| {
                let value = inner
                    .lru
                    .peek(&key)
                    .filter(|entry| !entry.is_expired(now))?
                    .value
                    .clone();
                Some(SimilarEntry {
                    key,
                    value,
                    similarity,
                })
            })
            .collect()
    }

    /// Remove every expired entry.
    ///
    /// Called by the background sweeper if started, but can also be called
    /// manually.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        sweep(&self.inner, now)
    }

    /// Start the periodic expiry sweep on the current tokio runtime.
    ///
    /// Returns `false` if the sweep is disabled, already running, or no
    /// runtime is available.
    pub fn start_sweeper(&self) -> bool {
        if !self.config.enable_cleanup_task {
            return false;
        }
        let inner: Weak<Mutex<CacheInner<V>>> = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.clock);
        self.sweeper
            .start("cache-sweeper", self.config.cleanup_interval, move || {
                let alive = match inner.upgrade() {
                    Some(inner) => {
                        sweep(&inner, clock.now());
                        true
                    }
                    None => false,
                };
                async move { alive }
            })
    }

    /// Stop the background sweep. Safe to call repeatedly.
    pub fn stop(&self) {
        self.sweeper.stop();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();

        let mut by_hits: Vec<(String, u64)> = inner
            .lru
            .iter()
            .map(|(key, entry)| (key.clone(), entry.access_count))
            .collect();
        by_hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        by_hits.truncate(TOP_KEYS);

        let most_recent_keys = inner
            .lru
            .iter()
            .take(TOP_KEYS)
            .map(|(key, _)| key.clone())
            .collect();

        let estimated_memory_bytes = inner
            .lru
            .iter()
            .map(|(key, entry)| {
                std::mem::size_of::<CacheEntry<V>>()
                    + ENTRY_OVERHEAD_BYTES
                    + key.len() * 2
                    + entry.tags.iter().map(String::len).sum::<usize>()
            })
            .sum();

        let avg_access_latency = if inner.access_samples == 0 {
            Duration::ZERO
        } else {
            let nanos = inner.access_time.as_nanos() / u128::from(inner.access_samples);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        CacheStats {
            entries: inner.lru.len(),
            capacity: self.config.capacity(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: TierStats::hit_rate(inner.hits, inner.misses),
            evictions: inner.evictions,
            expirations: inner.expirations,
            avg_access_latency,
            estimated_memory_bytes,
            hottest_keys: by_hits,
            most_recent_keys,
        }
    }
}

fn sweep<V>(inner: &Mutex<CacheInner<V>>, now: DateTime<Utc>) -> usize {
    let count = inner.lock().sweep(now);
    if count > 0 {
        info!(count, "Swept expired cache entries");
    }
    count
}

impl<V> Clone for BoundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            sweeper: Arc::clone(&self.sweeper),
        }
    }
}

#[async_trait]
impl<V> CacheBackend<V> for BoundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "bounded"
    }

    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(BoundedCache::get(self, key))
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<(V, Option<Duration>)>> {
        let now = self.clock.now();
        Ok(self.get_entry(key).map(|entry| {
            let remaining = entry.expires_at.map(|at| elapsed_between(now, at));
            (entry.value, remaining)
        }))
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let options = SetOptions {
            ttl,
            ..SetOptions::default()
        };
        BoundedCache::set(self, key, value, options);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(BoundedCache::delete(self, key))
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.has(key))
    }

    async fn clear(&self) -> Result<()> {
        BoundedCache::clear(self);
        Ok(())
    }

    async fn stats(&self) -> Result<TierStats> {
        let stats = BoundedCache::stats(self);
        Ok(TierStats {
            name: "bounded".to_string(),
            entries: stats.entries,
            capacity: stats.capacity,
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Current number of stored entries.
    pub entries: usize,

    /// Maximum capacity.
    pub capacity: usize,

    pub hits: u64,
    pub misses: u64,

    /// `hits / (hits + misses)`, or 0 with no lookups.
    pub hit_rate: f64,

    /// Entries removed to make room.
    pub evictions: u64,

    /// Entries removed because their TTL passed.
    pub expirations: u64,

    /// Mean wall time spent in `get`.
    pub avg_access_latency: Duration,

    /// Rough memory estimate (keys, tags and fixed per-entry overhead).
    pub estimated_memory_bytes: usize,

    /// Most-read keys with their access counts.
    pub hottest_keys: Vec<(String, u64)>,

    /// Most recently used keys.
    pub most_recent_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_types::{Clock, ManualClock};

    fn cache_with_clock(max_entries: usize) -> (BoundedCache<String>, Arc<ManualClock>) {
        let clock = ManualClock::starting_now();
        let config = CacheConfig::new()
            .with_max_entries(max_entries)
            .without_default_ttl();
        let cache = BoundedCache::with_clock(config, clock.clone());
        (cache, clock)
    }

    fn put(cache: &BoundedCache<String>, key: &str) {
        cache.set(key, key.to_uppercase(), SetOptions::default());
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = cache_with_clock(10);
        cache.set("statute:1", "text".to_string(), SetOptions::default());

        assert_eq!(cache.get("statute:1"), Some("text".to_string()));
        assert_eq!(cache.get("statute:2"), None);
    }

    #[test]
    fn test_lru_eviction() {
        let (cache, _) = cache_with_clock(3);
        for key in ["a", "b", "c", "d"] {
            put(&cache, key);
            assert!(cache.len() <= 3);
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lru_access_updates_order() {
        let (cache, _) = cache_with_clock(3);
        for key in ["a", "b", "c"] {
            put(&cache, key);
        }

        // Reading A makes B the least recently used.
        assert!(cache.get("a").is_some());
        put(&cache, "d");

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
    }

    #[test]
    fn test_update_existing_does_not_evict() {
        let (cache, _) = cache_with_clock(2);
        put(&cache, "a");
        put(&cache, "b");
        cache.set("a", "new".to_string(), SetOptions::default());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("a"), Some("new".to_string()));
        assert_eq!(cache.stats().evictions, 0);

        // The update promoted A, so B goes next.
        put(&cache, "c");
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[test]
    fn test_ttl_expiration_on_get() {
        let (cache, clock) = cache_with_clock(10);
        cache.set(
            "k",
            "v".to_string(),
            SetOptions::ttl(Duration::from_millis(1)),
        );

        clock.advance(Duration::from_millis(2));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("k", "v".to_string(), SetOptions::ttl(Duration::from_secs(1)));

        clock.advance(Duration::from_secs(1));
        assert!(cache.has("k"));

        clock.advance(Duration::from_millis(1));
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_default_ttl_applies() {
        let clock = ManualClock::starting_now();
        let config = CacheConfig::new().with_default_ttl(Duration::from_secs(10));
        let cache: BoundedCache<u32> = BoundedCache::with_clock(config, clock.clone());

        cache.set("k", 1, SetOptions::default());
        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_touch_promotes_without_hit() {
        let (cache, _) = cache_with_clock(3);
        for key in ["a", "b", "c"] {
            put(&cache, key);
        }

        assert!(cache.touch("a"));
        assert!(!cache.touch("missing"));
        put(&cache, "d");

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_access_metadata() {
        let (cache, clock) = cache_with_clock(10);
        put(&cache, "k");
        clock.advance(Duration::from_secs(5));

        cache.get("k");
        let entry = cache.get_entry("k").unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, clock.now());
        assert!(entry.created_at < entry.last_accessed);
    }

    #[test]
    fn test_keys_with_pattern() {
        let (cache, _) = cache_with_clock(10);
        for key in ["case:1", "case:2", "statute:1"] {
            put(&cache, key);
        }

        let mut all = cache.keys(None).unwrap();
        all.sort();
        assert_eq!(all, vec!["case:1", "case:2", "statute:1"]);

        let mut cases = cache.keys(Some("^case:")).unwrap();
        cases.sort();
        assert_eq!(cases, vec!["case:1", "case:2"]);

        assert!(cache.keys(Some("(unclosed")).is_err());
    }

    #[test]
    fn test_invalidate_pattern() {
        let (cache, _) = cache_with_clock(10);
        for key in ["case:1", "case:2", "statute:1"] {
            put(&cache, key);
        }

        assert_eq!(cache.invalidate("^case:").unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("statute:1"));
        assert_eq!(cache.invalidate("^nothing$").unwrap(), 0);
    }

    #[test]
    fn test_invalidate_tag() {
        let (cache, _) = cache_with_clock(10);
        cache.set("a", "1".into(), SetOptions::default().with_tag("torts"));
        cache.set(
            "b",
            "2".into(),
            SetOptions::default().with_tag("torts").with_tag("week-1"),
        );
        cache.set("c", "3".into(), SetOptions::default().with_tag("contracts"));

        assert_eq!(cache.invalidate_tag("torts"), 2);
        assert_eq!(cache.keys(None).unwrap(), vec!["c"]);
    }

    #[test]
    fn test_clear_keeps_stats() {
        let (cache, _) = cache_with_clock(10);
        put(&cache, "a");
        cache.get("a");
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_find_similar_orders_by_score() {
        let (cache, _) = cache_with_clock(10);
        put(&cache, "offer and acceptance");
        put(&cache, "offer acceptance consideration");
        put(&cache, "criminal procedure");

        let results = cache.find_similar("offer and acceptance", 0.5);
        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["offer and acceptance", "offer acceptance consideration"]);
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[0].value, "OFFER AND ACCEPTANCE");
        assert!(results[1].similarity >= 0.5);
    }

    #[test]
    fn test_find_similar_is_memoised() {
        let (cache, clock) = cache_with_clock(10);
        put(&cache, "duty of care");

        assert_eq!(cache.find_similar("duty of care", 0.9).len(), 1);

        // A new matching key is not visible until the memo window passes.
        put(&cache, "care of duty");
        assert_eq!(cache.find_similar("duty of care", 0.9).len(), 1);

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.find_similar("duty of care", 0.9).len(), 2);
    }

    #[test]
    fn test_find_similar_skips_removed_entries() {
        let (cache, _) = cache_with_clock(10);
        put(&cache, "duty of care");
        assert_eq!(cache.find_similar("duty of care", 0.9).len(), 1);

        cache.delete("duty of care");
        assert!(cache.find_similar("duty of care", 0.9).is_empty());
    }

    #[test]
    fn test_sweep_expired() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("short", "1".into(), SetOptions::ttl(Duration::from_secs(1)));
        cache.set("long", "2".into(), SetOptions::ttl(Duration::from_secs(100)));
        put(&cache, "forever");

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_stats() {
        let (cache, _) = cache_with_clock(100);
        for key in ["a", "b", "c"] {
            put(&cache, key);
        }
        cache.get("a");
        cache.get("a");
        cache.get("b");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(stats.hottest_keys[0], ("a".to_string(), 2));
        assert_eq!(stats.most_recent_keys[0], "b");
        assert!(stats.estimated_memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_background_sweeper() {
        let clock = ManualClock::starting_now();
        let config = CacheConfig::new()
            .with_cleanup_interval(Duration::from_millis(10))
            .without_default_ttl();
        let cache: BoundedCache<u32> = BoundedCache::with_clock(config, clock.clone());
        cache.set("k", 1, SetOptions::ttl(Duration::from_secs(1)));

        assert!(cache.start_sweeper());
        assert!(!cache.start_sweeper());
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.len(), 0);
        cache.stop();
        cache.stop();
    }

    #[test]
    fn test_sweeper_disabled() {
        let config = CacheConfig::new().with_cleanup_task(false);
        let cache: BoundedCache<u32> = BoundedCache::new(config);
        assert!(!cache.start_sweeper());
    }

    #[tokio::test]
    async fn test_backend_contract() {
        let (cache, _) = cache_with_clock(10);
        let backend: &dyn CacheBackend<String> = &cache;

        backend.set("k", "v".to_string(), None).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        assert!(backend.contains("k").await.unwrap());
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.contains("k").await.unwrap());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.name, "bounded");
        assert_eq!(stats.hits, 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn capacity_is_never_exceeded(
                capacity in 1usize..8,
                ops in proptest::collection::vec((0u8..16, any::<bool>()), 0..64),
            ) {
                let config = CacheConfig::new()
                    .with_max_entries(capacity)
                    .without_default_ttl();
                let cache: BoundedCache<u8> = BoundedCache::new(config);

                for (key, read) in ops {
                    let key = format!("k{key}");
                    if read {
                        cache.get(&key);
                    } else {
                        cache.set(key.clone(), 0, SetOptions::default());
                        prop_assert!(cache.has(&key));
                    }
                    prop_assert!(cache.len() <= capacity);
                }
            }
        }
    }
}

//! Durable cache tier backed by a flat JSON file.
//!
//! The file is a single object mapping each key to a [`PersistedEntry`]:
//!
//! ```json
//! {
//!   "case:42": {
//!     "value": { "...": "..." },
//!     "expiresAt": "2026-01-01T00:00:00Z",
//!     "accessCount": 3,
//!     "createdAt": "2025-12-31T00:00:00Z",
//!     "lastAccessed": "2025-12-31T12:00:00Z"
//!   }
//! }
//! ```
//!
//! The whole file is loaded when the tier is opened and rewritten on each
//! flush. Durability is best effort: a missing or unreadable file yields an
//! empty tier rather than an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lectern_types::{PeriodicTask, SharedClock, SystemClock, add_duration, elapsed_between};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::backend::{CacheBackend, TierStats};
use crate::config::FileCacheConfig;
use crate::error::Result;

/// One persisted key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry<V> {
    pub value: V,
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl<V> PersistedEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

struct FileInner<V> {
    entries: HashMap<String, PersistedEntry<V>>,
    hits: u64,
    misses: u64,
    /// Set by every mutation, cleared by a successful flush snapshot.
    dirty: bool,
}

/// Durable Tier-2 cache.
///
/// Entries live in memory and are written to disk by [`flush`](Self::flush),
/// by the periodic flusher, and on [`shutdown`](Self::shutdown). When full,
/// the least recently accessed entry is dropped; this scans all entries,
/// which is acceptable for a secondary tier.
pub struct FileCache<V> {
    inner: Arc<Mutex<FileInner<V>>>,
    config: FileCacheConfig,
    clock: SharedClock,
    flusher: Arc<PeriodicTask>,
    /// Held from snapshot to rename so concurrent flushes land in order.
    writer: Arc<AsyncMutex<()>>,
}

impl<V> FileCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open the tier, loading any existing file.
    pub async fn open(config: FileCacheConfig) -> Self {
        Self::open_with_clock(config, SystemClock::shared()).await
    }

    /// Open the tier with an explicit clock.
    pub async fn open_with_clock(config: FileCacheConfig, clock: SharedClock) -> Self {
        let entries = match &config.path {
            Some(path) => load_entries(path, clock.now()).await,
            None => HashMap::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(FileInner {
                entries,
                hits: 0,
                misses: 0,
                dirty: false,
            })),
            config,
            clock,
            flusher: Arc::new(PeriodicTask::new()),
            writer: Arc::new(AsyncMutex::new(())),
        }
    }

    /// A tier with no backing file.
    pub fn in_memory(max_entries: usize) -> Self {
        Self::in_memory_with_clock(max_entries, SystemClock::shared())
    }

    /// A tier with no backing file and an explicit clock.
    pub fn in_memory_with_clock(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FileInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                dirty: false,
            })),
            config: FileCacheConfig::default().with_max_entries(max_entries),
            clock,
            flusher: Arc::new(PeriodicTask::new()),
            writer: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the tier is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Whether there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    fn lookup(&self, key: &str) -> Option<(V, Option<Duration>)> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            inner.entries.remove(key);
            inner.dirty = true;
        }

        let found = inner.entries.get_mut(key).map(|entry| {
            entry.access_count += 1;
            entry.last_accessed = now;
            let remaining = entry.expires_at.map(|at| elapsed_between(now, at));
            (entry.value.clone(), remaining)
        });

        match found {
            Some(hit) => {
                inner.hits += 1;
                inner.dirty = true;
                Some(hit)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: &str, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let expires_at = ttl.map(|ttl| add_duration(now, ttl));
        let capacity = self.config.max_entries.max(1);

        let mut inner = self.inner.lock();
        inner.dirty = true;

        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            entry.last_accessed = now;
            return;
        }

        while inner.entries.len() >= capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    debug!(key = %oldest, "Evicting least recently accessed durable entry");
                }
                None => break,
            }
        }

        inner.entries.insert(
            key.to_string(),
            PersistedEntry {
                value,
                expires_at,
                access_count: 0,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    /// Remove expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.dirty = true;
        }
        removed
    }

    /// Write pending changes to the backing file.
    ///
    /// Returns `Ok(false)` when there is no file or nothing changed.
    pub async fn flush(&self) -> Result<bool> {
        match &self.config.path {
            Some(path) => flush_to(&self.inner, &self.writer, path).await,
            None => Ok(false),
        }
    }

    /// Start periodic flushing on the current tokio runtime.
    ///
    /// Returns `false` if there is no backing file, the flusher is already
    /// running, or no runtime is available.
    pub fn start_flusher(&self) -> bool {
        let Some(path) = self.config.path.clone() else {
            return false;
        };
        let inner: Weak<Mutex<FileInner<V>>> = Arc::downgrade(&self.inner);
        let writer = Arc::clone(&self.writer);

        self.flusher
            .start("cache-flusher", self.config.flush_interval, move || {
                let inner = inner.upgrade();
                let writer = Arc::clone(&writer);
                let path = path.clone();
                async move {
                    let Some(inner) = inner else {
                        return false;
                    };
                    if let Err(e) = flush_to(&inner, &writer, &path).await {
                        warn!(path = %path.display(), error = %e, "Periodic cache flush failed");
                    }
                    true
                }
            })
    }

    /// Stop the flusher and write any pending changes. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<()> {
        self.flusher.stop_and_wait().await;
        self.flush().await?;
        Ok(())
    }
}

/// Read the backing file; any failure yields an empty map.
async fn load_entries<V: DeserializeOwned>(
    path: &Path,
    now: DateTime<Utc>,
) -> HashMap<String, PersistedEntry<V>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No durable cache file, starting empty");
            return HashMap::new();
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to read durable cache, starting empty"
            );
            return HashMap::new();
        }
    };

    match serde_json::from_slice::<HashMap<String, PersistedEntry<V>>>(&bytes) {
        Ok(mut entries) => {
            let total = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            info!(
                path = %path.display(),
                loaded = entries.len(),
                dropped_expired = total - entries.len(),
                "Durable cache loaded"
            );
            entries
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Durable cache file is corrupt, starting empty"
            );
            HashMap::new()
        }
    }
}

/// Snapshot under the lock, then write outside it via a temp file + rename.
async fn flush_to<V: Serialize + Clone>(
    inner: &Mutex<FileInner<V>>,
    writer: &AsyncMutex<()>,
    path: &Path,
) -> Result<bool> {
    let _writing = writer.lock().await;
    let snapshot = {
        let mut inner = inner.lock();
        if !inner.dirty {
            return Ok(false);
        }
        inner.dirty = false;
        inner.entries.clone()
    };

    let result = write_snapshot(&snapshot, path).await;
    if result.is_err() {
        inner.lock().dirty = true;
    } else {
        debug!(path = %path.display(), entries = snapshot.len(), "Durable cache flushed");
    }
    result.map(|()| true)
}

async fn write_snapshot<V: Serialize>(
    snapshot: &HashMap<String, PersistedEntry<V>>,
    path: &Path,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl<V> Clone for FileCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            flusher: Arc::clone(&self.flusher),
            writer: Arc::clone(&self.writer),
        }
    }
}

#[async_trait]
impl<V> CacheBackend<V> for FileCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.lookup(key).map(|(value, _)| value))
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<(V, Option<Duration>)>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        self.store(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.dirty = true;
        }
        Ok(removed)
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        Ok(inner.entries.get(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.dirty = true;
        Ok(())
    }

    async fn stats(&self) -> Result<TierStats> {
        let inner = self.inner.lock();
        Ok(TierStats {
            name: "file".to_string(),
            entries: inner.entries.len(),
            capacity: self.config.max_entries.max(1),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: TierStats::hit_rate(inner.hits, inner.misses),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_types::ManualClock;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache: FileCache<String> = FileCache::open(FileCacheConfig::at(&path)).await;
        cache.set("case:1", "Donoghue v Stevenson".into(), None).await.unwrap();
        assert!(cache.is_dirty());
        assert!(cache.flush().await.unwrap());
        assert!(!cache.is_dirty());
        assert!(!cache.flush().await.unwrap());

        let reopened: FileCache<String> = FileCache::open(FileCacheConfig::at(&path)).await;
        assert_eq!(
            reopened.get("case:1").await.unwrap(),
            Some("Donoghue v Stevenson".to_string())
        );
    }

    #[tokio::test]
    async fn test_persisted_layout_is_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache: FileCache<u32> = FileCache::open(FileCacheConfig::at(&path)).await;
        cache
            .set("k", 7, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        cache.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let entry = &raw["k"];
        assert_eq!(entry["value"], 7);
        assert_eq!(entry["accessCount"], 0);
        assert!(entry["expiresAt"].is_string());
        assert!(entry["createdAt"].is_string());
        assert!(entry["lastAccessed"].is_string());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache: FileCache<String> = FileCache::open(FileCacheConfig::at(&path)).await;
        assert!(cache.is_empty());

        // Still usable and able to overwrite the bad file.
        cache.set("k", "v".into(), None).await.unwrap();
        assert!(cache.flush().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache: FileCache<String> = FileCache::open(FileCacheConfig::at(&path)).await;
        assert!(cache.is_empty());
        cache.set("k", "v".into(), None).await.unwrap();
        assert!(cache.flush().await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_expired_entries_dropped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let clock = ManualClock::starting_now();

        let cache: FileCache<u32> =
            FileCache::open_with_clock(FileCacheConfig::at(&path), clock.clone()).await;
        cache.set("short", 1, Some(Duration::from_secs(1))).await.unwrap();
        cache.set("long", 2, None).await.unwrap();
        cache.flush().await.unwrap();

        clock.advance(Duration::from_secs(5));
        let reopened: FileCache<u32> =
            FileCache::open_with_clock(FileCacheConfig::at(&path), clock.clone()).await;
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let clock = ManualClock::starting_now();
        let cache: FileCache<u32> = FileCache::in_memory_with_clock(10, clock.clone());
        cache.set("k", 1, Some(Duration::from_millis(1))).await.unwrap();

        clock.advance(Duration::from_millis(2));
        assert!(!cache.contains("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_accessed() {
        let clock = ManualClock::starting_now();
        let cache: FileCache<u32> = FileCache::in_memory_with_clock(2, clock.clone());

        cache.set("a", 1, None).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("b", 2, None).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.get("a").await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("c", 3, None).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a").await.unwrap());
        assert!(!cache.contains("b").await.unwrap());
        assert!(cache.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let config = FileCacheConfig::at(&path).with_flush_interval(Duration::from_secs(3600));

        let cache: FileCache<String> = FileCache::open(config.clone()).await;
        assert!(cache.start_flusher());
        cache.set("k", "v".into(), None).await.unwrap();
        cache.shutdown().await.unwrap();
        cache.shutdown().await.unwrap();

        let reopened: FileCache<String> = FileCache::open(config).await;
        assert_eq!(reopened.len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let config = FileCacheConfig::at(&path).with_flush_interval(Duration::from_millis(10));

        let cache: FileCache<String> = FileCache::open(config).await;
        cache.start_flusher();
        cache.set("k", "v".into(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(path.exists());
        assert!(!cache.is_dirty());
        cache.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_flushes_keep_latest_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache: FileCache<u32> = FileCache::open(FileCacheConfig::at(&path)).await;

        let writers: Vec<_> = (0..16u32)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.set(&format!("k{i}"), i, None).await.unwrap();
                    cache.flush().await.unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }
        assert!(!cache.is_dirty());
        assert!(!temp_path(&path).exists());

        let reopened: FileCache<u32> = FileCache::open(FileCacheConfig::at(&path)).await;
        assert_eq!(reopened.len(), 16);
        assert_eq!(reopened.get("k15").await.unwrap(), Some(15));
    }

    #[test]
    fn test_in_memory_has_no_flusher() {
        let cache: FileCache<u32> = FileCache::in_memory(10);
        assert!(cache.path().is_none());
        assert!(!cache.start_flusher());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/data/cache.json")),
            PathBuf::from("/data/cache.json.tmp")
        );
    }
}

//! Bounded LRU cache with TTL support and a two-tier cache orchestrator.
//!
//! This crate provides:
//! - [`BoundedCache`]: capacity-bounded LRU cache with per-entry TTL, pattern
//!   and tag invalidation, similarity lookup and statistics
//! - [`FileCache`]: a durable tier persisted as a flat JSON file
//! - [`TieredCache`]: Tier-1/Tier-2 orchestration with promotion on Tier-1
//!   miss and failure-tolerant Tier-2 writes
//! - [`CacheBackend`]: the contract both tiers implement
//!
//! # Example
//!
//! ```rust,ignore
//! use lectern_cache::{BoundedCache, CacheConfig, FileCache, TieredCache, TieredConfig};
//!
//! let tier1 = BoundedCache::new(CacheConfig::default().with_max_entries(1000));
//! let tier2 = FileCache::open(FileCacheConfig::at("cache.json")).await;
//! let cache = TieredCache::new(Arc::new(tier1), Arc::new(tier2), TieredConfig::default());
//! ```

mod backend;
mod bounded;
mod config;
mod entry;
mod error;
mod file;
pub mod similarity;
mod tiered;

pub use backend::{CacheBackend, TierStats};
pub use bounded::{BoundedCache, CacheStats};
pub use config::{CacheConfig, FileCacheConfig, TieredConfig};
pub use entry::{CacheEntry, SetOptions, SimilarEntry};
pub use error::{CacheError, Result};
pub use file::{FileCache, PersistedEntry};
pub use tiered::{TieredCache, TieredSetOptions, TieredStats, WarmupReport};

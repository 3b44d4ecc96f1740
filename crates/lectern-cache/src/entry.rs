//! Cache entries and write options.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entry stored in a [`BoundedCache`](crate::BoundedCache).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry<V> {
    /// Key the entry is stored under.
    pub key: String,

    /// Cached value.
    pub value: V,

    /// When the key was first inserted.
    pub created_at: DateTime<Utc>,

    /// Last read, write or touch.
    pub last_accessed: DateTime<Utc>,

    /// Number of reads that hit this entry.
    pub access_count: u64,

    /// Absolute expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// Tags for group invalidation.
    pub tags: Vec<String>,

    /// Free-form caller metadata.
    pub metadata: Option<serde_json::Value>,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(
        key: String,
        value: V,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            expires_at,
            tags: Vec::new(),
            metadata: None,
        }
    }

    /// Whether the entry is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Whether the entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub(crate) fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

/// Options for [`BoundedCache::set`](crate::BoundedCache::set).
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL for this entry; `None` uses the cache default.
    pub ttl: Option<Duration>,

    /// Tags attached to the entry.
    pub tags: Vec<String>,

    /// Free-form metadata attached to the entry.
    pub metadata: Option<serde_json::Value>,
}

impl SetOptions {
    /// Options with only a TTL.
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A `find_similar` match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarEntry<V> {
    /// Matching key.
    pub key: String,

    /// Value stored under the key.
    pub value: V,

    /// Jaccard similarity between the query and the key, in `0.0..=1.0`.
    pub similarity: f64,
}

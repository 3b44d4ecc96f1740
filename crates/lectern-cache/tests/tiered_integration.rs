//! End-to-end tests for the two-tier cache with a file-backed Tier-2.

use std::sync::Arc;
use std::time::Duration;

use lectern_cache::{
    BoundedCache, CacheBackend, CacheConfig, FileCache, FileCacheConfig, SetOptions, TieredCache,
    TieredConfig, TieredSetOptions,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CaseSummary {
    title: String,
    year: u16,
}

fn summary(title: &str, year: u16) -> CaseSummary {
    CaseSummary {
        title: title.to_string(),
        year,
    }
}

async fn orchestrator(
    path: &std::path::Path,
) -> (
    TieredCache<CaseSummary>,
    BoundedCache<CaseSummary>,
    FileCache<CaseSummary>,
) {
    let tier1 = BoundedCache::new(CacheConfig::new().with_max_entries(2));
    let tier2 = FileCache::open(FileCacheConfig::at(path)).await;
    let cache = TieredCache::new(
        Arc::new(tier1.clone()),
        Arc::new(tier2.clone()),
        TieredConfig::new().with_default_ttl(Duration::from_secs(3600)),
    );
    (cache, tier1, tier2)
}

#[tokio::test]
async fn test_values_survive_restart_through_tier2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tier2.json");

    {
        let (cache, _, tier2) = orchestrator(&path).await;
        cache
            .set(
                "case:donoghue",
                summary("Donoghue v Stevenson", 1932),
                TieredSetOptions::default(),
            )
            .await
            .unwrap();
        tier2.shutdown().await.unwrap();
    }

    let (cache, tier1, _) = orchestrator(&path).await;
    assert!(tier1.is_empty());
    assert_eq!(
        cache.get("case:donoghue").await,
        Some(summary("Donoghue v Stevenson", 1932))
    );
    // Promoted on the way through.
    assert_eq!(
        tier1.get("case:donoghue"),
        Some(summary("Donoghue v Stevenson", 1932))
    );
}

#[tokio::test]
async fn test_tier1_eviction_falls_back_to_tier2() {
    let dir = TempDir::new().unwrap();
    let (cache, tier1, _) = orchestrator(&dir.path().join("tier2.json")).await;

    for (i, title) in ["Carlill", "Hadley", "Rylands"].iter().enumerate() {
        cache
            .set(
                &format!("case:{i}"),
                summary(title, 1850 + i as u16),
                TieredSetOptions::default(),
            )
            .await
            .unwrap();
    }

    // Tier-1 holds only two; the oldest was evicted but Tier-2 still has it.
    assert_eq!(tier1.len(), 2);
    assert!(!tier1.has("case:0"));
    assert_eq!(cache.get("case:0").await, Some(summary("Carlill", 1850)));

    let stats = cache.stats().await;
    assert_eq!(stats.tier2_hits, 1);
    assert_eq!(stats.tier2.unwrap().entries, 3);
}

#[tokio::test]
async fn test_tier1_only_values_do_not_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tier2.json");
    let (cache, _, tier2) = orchestrator(&path).await;

    cache
        .set("draft", summary("Draft", 2024), TieredSetOptions::tier1_only())
        .await
        .unwrap();
    assert!(!tier2.contains("draft").await.unwrap());
    assert!(!tier2.flush().await.unwrap());
}

#[tokio::test]
async fn test_direct_tier1_writes_are_visible() {
    let dir = TempDir::new().unwrap();
    let (cache, tier1, _) = orchestrator(&dir.path().join("tier2.json")).await;

    tier1.set(
        "hot",
        summary("Hot", 2020),
        SetOptions::default().with_tag("week-1"),
    );
    assert_eq!(cache.get("hot").await, Some(summary("Hot", 2020)));
    assert_eq!(tier1.invalidate_tag("week-1"), 1);
    assert_eq!(cache.get("hot").await, None);
}

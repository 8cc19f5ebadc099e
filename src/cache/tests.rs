//! Tests for cache stores

use super::*;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ))
}

// ============================================================================
// CacheEntry / CachePolicy Tests
// ============================================================================

#[test]
fn test_cache_entry_expiry() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let entry = CacheEntry::new("k", json!(1), now, Duration::from_secs(60));

    assert!(!entry.is_expired_at(now));
    assert!(!entry.is_expired_at(now + chrono::Duration::seconds(59)));
    assert!(entry.is_expired_at(now + chrono::Duration::seconds(60)));
}

#[test]
fn test_cache_entry_zero_ttl_is_expired() {
    let now = Utc::now();
    let entry = CacheEntry::new("k", json!(1), now, Duration::ZERO);
    assert!(entry.is_expired_at(now));
}

#[test]
fn test_cache_policy_defaults() {
    let policy = CachePolicy::default();
    assert!(!policy.enabled);
    assert_eq!(policy.ttl, Duration::from_secs(86_400));

    let policy = CachePolicy::enabled(3600);
    assert!(policy.enabled);
    assert_eq!(policy.ttl, Duration::from_secs(3600));
}

#[test]
fn test_manual_clock_advances() {
    let clock = fixed_clock();
    let start = clock.now();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
}

// ============================================================================
// MemoryCache Tests
// ============================================================================

#[tokio::test]
async fn test_memory_cache_roundtrip() {
    let cache = MemoryCache::new();
    assert!(cache.get("missing").await.unwrap().is_none());

    cache
        .set("key", json!({"a": 1}), Duration::from_secs(60))
        .await
        .unwrap();

    let entry = cache.get("key").await.unwrap().unwrap();
    assert_eq!(entry.key, "key");
    assert_eq!(entry.value, json!({"a": 1}));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_memory_cache_expired_read_is_miss() {
    let clock = fixed_clock();
    let cache = MemoryCache::with_clock(clock.clone());

    cache
        .set("key", json!([1, 2]), Duration::from_secs(3600))
        .await
        .unwrap();

    clock.advance(Duration::from_secs(3599));
    assert!(cache.get("key").await.unwrap().is_some());

    clock.advance(Duration::from_secs(1));
    assert!(cache.get("key").await.unwrap().is_none());

    assert_eq!(cache.purge_expired().await, 1);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_memory_cache_overwrite_resets_expiry() {
    let clock = fixed_clock();
    let cache = MemoryCache::with_clock(clock.clone());

    cache.set("key", json!(1), Duration::from_secs(10)).await.unwrap();
    clock.advance(Duration::from_secs(8));
    cache.set("key", json!(2), Duration::from_secs(10)).await.unwrap();
    clock.advance(Duration::from_secs(8));

    let entry = cache.get("key").await.unwrap().unwrap();
    assert_eq!(entry.value, json!(2));
}

// ============================================================================
// FileCache Tests
// ============================================================================

#[tokio::test]
async fn test_file_cache_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::new(dir.path().join("cache"));

    assert!(cache.get("key").await.unwrap().is_none());

    cache
        .set("key", json!({"items": [1, 2, 3]}), Duration::from_secs(60))
        .await
        .unwrap();

    assert!(cache.entry_path("key").exists());
    let entry = cache.get("key").await.unwrap().unwrap();
    assert_eq!(entry.value, json!({"items": [1, 2, 3]}));
}

#[tokio::test]
async fn test_file_cache_survives_new_instance() {
    let dir = tempfile::tempdir().unwrap();

    FileCache::new(dir.path())
        .set("key", json!("persisted"), Duration::from_secs(60))
        .await
        .unwrap();

    let reopened = FileCache::new(dir.path());
    let entry = reopened.get("key").await.unwrap().unwrap();
    assert_eq!(entry.value, json!("persisted"));
}

#[tokio::test]
async fn test_file_cache_expired_entry_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = fixed_clock();
    let cache = FileCache::with_clock(dir.path(), clock.clone());

    cache.set("key", json!(1), Duration::from_secs(5)).await.unwrap();
    clock.advance(Duration::from_secs(6));

    assert!(cache.get("key").await.unwrap().is_none());
    assert!(!cache.entry_path("key").exists());
}

#[tokio::test]
async fn test_file_cache_corrupt_entry_is_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::new(dir.path());

    std::fs::write(cache.entry_path("key"), "{not json").unwrap();
    assert!(cache.get("key").await.unwrap().is_none());
}

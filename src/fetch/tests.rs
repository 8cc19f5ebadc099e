//! Tests for the fetcher

use super::*;
use crate::cache::{CachePolicy, CacheStore, FileCache, ManualClock, MemoryCache};
use crate::http::{HttpClient, HttpClientConfig, RequestSpec};
use crate::pagination::{MergeStrategy, NextPage, Page, PaginationPlan};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Arc<HttpClient> {
    Arc::new(HttpClient::with_config(HttpClientConfig::builder().max_retries(0).build()).unwrap())
}

async fn items_server(expected_calls: u64) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(expected_calls)
        .mount(&mock_server)
        .await;
    mock_server
}

#[test]
fn test_local_save_path() {
    let options = FetchOptions::new("posts").local_save("/tmp/data");
    assert_eq!(
        options.local_save_path(),
        Some(std::path::PathBuf::from("/tmp/data/posts.json"))
    );
    assert_eq!(FetchOptions::new("posts").local_save_path(), None);
}

#[tokio::test]
async fn test_cache_hit_within_ttl_skips_network() {
    let mock_server = items_server(1).await;
    let clock = Arc::new(ManualClock::starting_now());
    let cache = Arc::new(MemoryCache::with_clock(clock.clone()));
    let fetcher = Fetcher::new(client()).with_cache(cache);

    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    let options = FetchOptions::new("items").cache(CachePolicy::enabled(3600));

    let first = fetcher.fetch(&request, &options).await.unwrap();
    clock.advance(Duration::from_secs(3599));
    let second = fetcher.fetch(&request, &options).await.unwrap();

    assert_eq!(first, json!([{"id": 1}]));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cache_expiry_triggers_second_call() {
    let mock_server = items_server(2).await;
    let clock = Arc::new(ManualClock::starting_now());
    let cache = Arc::new(MemoryCache::with_clock(clock.clone()));
    let fetcher = Fetcher::new(client()).with_cache(cache);

    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    let options = FetchOptions::new("items").cache(CachePolicy::enabled(3600));

    fetcher.fetch(&request, &options).await.unwrap();
    clock.advance(Duration::from_secs(3600));
    fetcher.fetch(&request, &options).await.unwrap();
}

#[tokio::test]
async fn test_disabled_cache_always_fetches() {
    let mock_server = items_server(2).await;
    let cache = Arc::new(MemoryCache::new());
    let fetcher = Fetcher::new(client()).with_cache(cache.clone());

    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    let options = FetchOptions::new("items");

    fetcher.fetch(&request, &options).await.unwrap();
    fetcher.fetch(&request, &options).await.unwrap();
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_different_requests_do_not_share_entries() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(client()).with_cache(Arc::new(MemoryCache::new()));
    let options = FetchOptions::new("items").cache(CachePolicy::enabled(3600));
    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));

    fetcher.fetch(&request, &options).await.unwrap();
    fetcher
        .fetch(&request.clone().query("page", "2"), &options)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_file_cache_serves_second_fetcher() {
    let mock_server = items_server(1).await;
    let dir = tempfile::tempdir().unwrap();

    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    let options = FetchOptions::new("items").cache(CachePolicy::enabled(60));

    let first = Fetcher::new(client()).with_cache(Arc::new(FileCache::new(dir.path())));
    first.fetch(&request, &options).await.unwrap();

    let second = Fetcher::new(client()).with_cache(Arc::new(FileCache::new(dir.path())));
    let document = second.fetch(&request, &options).await.unwrap();
    assert_eq!(document, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_local_save_writes_pretty_json() {
    let mock_server = items_server(1).await;
    let dir = tempfile::tempdir().unwrap();
    let save_dir = dir.path().join("raw");

    let options = FetchOptions::new("posts").local_save(&save_dir);
    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    Fetcher::new(client()).fetch(&request, &options).await.unwrap();

    let saved = std::fs::read_to_string(save_dir.join("posts.json")).unwrap();
    assert!(saved.contains('\n'));
    let parsed: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(parsed, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_local_save_failure_is_not_fatal() {
    let mock_server = items_server(1).await;
    let file = tempfile::NamedTempFile::new().unwrap();

    // A regular file cannot act as the save directory
    let options = FetchOptions::new("posts").local_save(file.path());
    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));
    let document = Fetcher::new(client()).fetch(&request, &options).await.unwrap();

    assert_eq!(document, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_fetch_error_propagates_and_is_not_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let fetcher = Fetcher::new(client()).with_cache(cache.clone());
    let options = FetchOptions::new("items").cache(CachePolicy::enabled(3600));
    let request = RequestSpec::new(format!("{}/items", mock_server.uri()));

    let err = fetcher.fetch(&request, &options).await.unwrap_err();
    assert!(err.is_fetch_error());
    assert!(cache
        .get(&options.cache_key(&request))
        .await
        .unwrap()
        .is_none());
}

#[test]
fn test_cache_key_covers_page_handling() {
    let request = RequestSpec::new("https://api.example.com/feed");
    let plain = FetchOptions::new("feed");
    let key = plain.cache_key(&request);

    assert_eq!(key, FetchOptions::new("other-name").cache_key(&request));
    assert_eq!(key.len(), 64);

    let variants = [
        PaginationPlan::single().payload_key(Some("posts".to_string())),
        PaginationPlan::single().max_pages(Some(2)),
        PaginationPlan::single().merge(MergeStrategy::Replace),
        PaginationPlan::with_next(Arc::new(|_: &Page, _: &Value| NextPage::Done)),
    ];
    for plan in variants {
        let options = FetchOptions::new("feed").pagination(plan);
        assert_ne!(options.cache_key(&request), key);
    }

    let cursor = |id: &str| {
        FetchOptions::new("feed").pagination(
            PaginationPlan::with_next(Arc::new(|_: &Page, _: &Value| NextPage::Done))
                .strategy_id(id),
        )
    };
    assert_ne!(
        cursor("cursor").cache_key(&request),
        cursor("offset").cache_key(&request)
    );
}

#[tokio::test]
async fn test_cache_separates_sources_with_different_payload_keys() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [{"t": 1}],
            "users": [{"u": 2}]
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(client()).with_cache(Arc::new(MemoryCache::new()));
    let request = RequestSpec::new(format!("{}/feed", mock_server.uri()));
    let unwrapping = |key: &str| {
        FetchOptions::new(key)
            .cache(CachePolicy::enabled(3600))
            .pagination(PaginationPlan::single().payload_key(Some(key.to_string())))
    };

    let posts = fetcher.fetch(&request, &unwrapping("posts")).await.unwrap();
    let users = fetcher.fetch(&request, &unwrapping("users")).await.unwrap();
    let posts_again = fetcher.fetch(&request, &unwrapping("posts")).await.unwrap();

    assert_eq!(posts, json!([{"t": 1}]));
    assert_eq!(users, json!([{"u": 2}]));
    assert_eq!(posts_again, posts);
}

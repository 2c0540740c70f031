mod common;

use std::time::Duration;

use common::{init_logging, scratch_config, strings, FakeLookup};
use dns_stale_cache::store::{unix_now, Entry};
use dns_stale_cache::{Error, Resolver};
use tempfile::tempdir;
use tokio::time::Instant;

#[tokio::test]
async fn resolve_first_always_queries() {
    let dir = tempdir().unwrap();
    init_logging();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    for round in 1..=3 {
        let res = resolver.lookup(&["example.com:6379"]).await.unwrap();
        assert_eq!(res, ["10.0.0.1:6379"]);
        assert_eq!(fake.calls(), round);
    }
    assert_eq!(resolver.refreshes_submitted(), 0);
}

#[tokio::test]
async fn resolve_first_picks_up_changes() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;
    resolver.lookup(&["example.com:80"]).await.unwrap();

    fake.answer("example.com", &["10.0.0.2", "10.0.0.3"]);
    let res = resolver.lookup(&["example.com:80"]).await.unwrap();
    assert_eq!(res, ["10.0.0.2:80,10.0.0.3:80"]);
    let entry = resolver.store().entry("example.com:80").await.unwrap();
    assert!(!entry.persisted());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cache_first_returns_immediately() {
    let dir = tempdir().unwrap();
    init_logging();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let mut config = scratch_config(&dir);
    config.set_cache_first(true);
    config.set_lookup_timeout(Duration::from_secs(10));
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    // A cold key is resolved right away.
    let res = resolver.lookup(&["example.com:6379"]).await.unwrap();
    assert_eq!(res, ["10.0.0.1:6379"]);
    assert_eq!(fake.calls(), 1);
    assert_eq!(resolver.refreshes_submitted(), 0);

    // A warm key is answered from the cache despite a slow resolver.
    fake.answer("example.com", &["10.0.0.2"]);
    fake.set_delay(Duration::from_secs(5));
    let start = Instant::now();
    let res = resolver.lookup(&["example.com:6379"]).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(res, ["10.0.0.1:6379"]);
    assert_eq!(resolver.refreshes_submitted(), 1);

    // The background refresh updates the cache eventually.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fake.calls(), 2);
    let res = resolver.store().get("example.com:6379").await.unwrap();
    assert_eq!(res, ["10.0.0.2:6379"]);
}

#[tokio::test]
async fn cache_first_serves_cache_when_resolver_fails() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let mut config = scratch_config(&dir);
    config.set_cache_first(true);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;
    resolver.lookup(&["example.com:6379"]).await.unwrap();

    fake.forget("example.com");
    for _ in 0..3 {
        let res = resolver.lookup(&["example.com:6379"]).await.unwrap();
        assert_eq!(res, ["10.0.0.1:6379"]);
    }
}

#[tokio::test]
async fn failed_resolution_keeps_cache() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;
    resolver.lookup(&["example.com:6379"]).await.unwrap();
    let before = resolver.store().entry("example.com:6379").await.unwrap();

    fake.forget("example.com");
    let res = resolver.lookup(&["example.com:6379"]).await.unwrap();
    assert_eq!(res, ["10.0.0.1:6379"]);
    assert_eq!(fake.calls(), 2);
    let after = resolver.store().entry("example.com:6379").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn unresolvable_cold_targets_are_omitted() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("b.example", &["10.0.0.2"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let res = resolver
        .lookup(&["a.example:1", "b.example:2", "no-port.example"])
        .await
        .unwrap();
    assert_eq!(res, ["10.0.0.2:2"]);
    // The target without a port never reaches the lookup.
    assert_eq!(fake.hosts(), ["a.example", "b.example"]);
    assert!(resolver.store().get("a.example:1").await.is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn timeout_leaves_cache_untouched() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("slow.example", &["10.0.0.1"]);
    fake.set_delay(Duration::from_secs(5));
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let start = Instant::now();
    let res = resolver.lookup(&["slow.example:80"]).await.unwrap();
    assert!(res.is_empty());
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(resolver.store().is_empty());
}

#[tokio::test]
async fn url_targets_are_normalized() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let res = resolver.lookup(&["redis://example.com:6379/0"]).await.unwrap();
    assert_eq!(res, ["10.0.0.1:6379"]);
    assert_eq!(fake.hosts(), ["example.com"]);
    assert!(resolver.store().get("example.com:6379").await.is_some());
}

#[tokio::test]
async fn malformed_url_rejects_whole_batch() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let res = resolver.lookup(&["example.com:6379", "http://%zz"]).await;
    assert!(matches!(res, Err(Error::InvalidUrl { .. })));
    assert_eq!(fake.calls(), 0);
    assert!(resolver.store().is_empty());
}

#[tokio::test]
async fn ipv6_addresses_are_bracketed_and_deduplicated() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("dual.example", &["10.0.0.1", "2001:db8::1", "10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let res = resolver.lookup(&["dual.example:443"]).await.unwrap();
    assert_eq!(res, ["10.0.0.1:443,[2001:db8::1]:443"]);
}

#[tokio::test]
async fn results_follow_input_order() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("a.example", &["10.0.0.1"]);
    fake.answer("b.example", &["10.0.0.2"]);
    let mut config = scratch_config(&dir);
    config.set_targets(["b.example:2", "a.example:1"]);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let res = resolver.lookup_host().await.unwrap();
    assert_eq!(res, ["10.0.0.2:2", "10.0.0.1:1"]);
}

#[tokio::test]
async fn eviction_removes_only_stale_entries() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    let mut config = scratch_config(&dir);
    config.set_stale_after(Duration::from_secs(3600));
    let resolver = Resolver::with_lookup(config, fake.clone()).await;

    let now = unix_now();
    let old = Entry::new(strings(&["10.0.0.1:1"]), now - 7200, true);
    let fresh = Entry::new(strings(&["10.0.0.2:1"]), now - 60, true);
    resolver.store().insert("old.example:1", old.unwrap()).await;
    resolver.store().insert("fresh.example:1", fresh.unwrap()).await;

    assert_eq!(resolver.evict().await.unwrap(), 1);
    assert!(resolver.store().get("old.example:1").await.is_none());
    assert!(resolver.store().get("fresh.example:1").await.is_some());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn shutdown_stops_background_refreshes() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let mut config = scratch_config(&dir);
    config.set_cache_first(true);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;
    resolver.lookup(&["example.com:80"]).await.unwrap();
    assert_eq!(fake.calls(), 1);

    resolver.shutdown();
    let res = resolver.lookup(&["example.com:80"]).await.unwrap();
    assert_eq!(res, ["10.0.0.1:80"]);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn clones_share_the_cache() {
    let dir = tempdir().unwrap();
    let fake = FakeLookup::new();
    fake.answer("example.com", &["10.0.0.1"]);
    let config = scratch_config(&dir);
    let resolver = Resolver::with_lookup(config, fake.clone()).await;
    let clone = resolver.clone();

    resolver.lookup(&["example.com:80"]).await.unwrap();
    assert_eq!(
        clone.store().get("example.com:80").await.unwrap(),
        ["10.0.0.1:80"]
    );
}

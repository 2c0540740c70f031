//! The cache store.
//!
//! This module implements the in-memory part of the cache: a concurrent
//! map from a normalized `host:port` key to the most recent successful
//! resolution of that key. The map is unbounded. Entries only disappear
//! through an explicit [`Store::remove`] or an eviction pass driven from
//! the outside.
//!
//! All updates that depend on the current value of a key, i.e., refreshing
//! an entry and marking it as written to disk, go through moka's per-key
//! compute operation so that two tasks touching the same key never act on
//! outdated information.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

//------------ Entry ---------------------------------------------------------

/// A cached resolution of a single key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    /// The resolved addresses as `ip:port` in resolver order.
    addrs: Vec<String>,

    /// When the addresses were resolved, in seconds since the epoch.
    stored_at: u64,

    /// Whether this value has been written to the cache file.
    persisted: bool,
}

impl Entry {
    /// Creates a new entry.
    ///
    /// Returns `None` if `addrs` is empty, as an entry without addresses
    /// is the same as no entry at all.
    pub fn new(
        addrs: Vec<String>,
        stored_at: u64,
        persisted: bool,
    ) -> Option<Self> {
        if addrs.is_empty() {
            return None;
        }
        Some(Self {
            addrs,
            stored_at,
            persisted,
        })
    }

    /// Returns the resolved addresses.
    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    /// Returns when the addresses were resolved.
    pub fn stored_at(&self) -> u64 {
        self.stored_at
    }

    /// Returns whether the entry has been written to the cache file.
    pub fn persisted(&self) -> bool {
        self.persisted
    }

    /// Returns whether the entry is at least `window` old at `now`.
    ///
    /// Entries from the future are never stale.
    pub fn is_stale(&self, now: u64, window: Duration) -> bool {
        now.saturating_sub(self.stored_at) >= window.as_secs()
    }

    /// Returns the same value marked as persisted.
    fn to_persisted(&self) -> Self {
        Self {
            persisted: true,
            ..self.clone()
        }
    }
}

//------------ Store ---------------------------------------------------------

/// The concurrent map from keys to cache entries.
///
/// Cloning a store is cheap and all clones share the same entries.
#[derive(Clone)]
pub struct Store {
    /// The underlying concurrent map.
    cache: Cache<String, Arc<Entry>>,
}

impl Store {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Returns the addresses cached for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Vec<String>> {
        self.cache.get(key).await.map(|entry| entry.addrs.clone())
    }

    /// Returns the complete entry cached for `key`, if any.
    pub async fn entry(&self, key: &str) -> Option<Arc<Entry>> {
        self.cache.get(key).await
    }

    /// Stores `addrs` for `key` as resolved right now.
    ///
    /// An empty address list is ignored.
    pub async fn put(
        &self,
        key: &str,
        addrs: Vec<String>,
        persisted: bool,
    ) {
        if let Some(entry) = Entry::new(addrs, unix_now(), persisted) {
            self.insert(key, entry).await
        }
    }

    /// Stores an existing entry for `key`, replacing whatever is there.
    pub async fn insert(&self, key: &str, entry: Entry) {
        self.cache.insert(key.into(), Arc::new(entry)).await
    }

    /// Replaces the entry for `key` if the addresses have changed.
    ///
    /// The comparison is order sensitive. A new entry is marked as not
    /// persisted. Returns whether the entry was replaced. Lists of
    /// addresses that are empty are never stored.
    pub async fn refresh(&self, key: &str, addrs: Vec<String>) -> bool {
        if addrs.is_empty() {
            return false;
        }
        let res = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if current.value().addrs == addrs => {
                        Op::Nop
                    }
                    _ => Op::Put(Arc::new(Entry {
                        addrs,
                        stored_at: unix_now(),
                        persisted: false,
                    })),
                };
                std::future::ready(op)
            })
            .await;
        matches!(res, CompResult::Inserted(_) | CompResult::ReplacedWith(_))
    }

    /// Marks the entry for `key` as persisted.
    ///
    /// The mark is only set if the entry still has the value given in
    /// `written`, so a refresh that happened in between is not lost.
    /// Returns whether the mark was set.
    pub async fn mark_persisted(&self, key: &str, written: &Entry) -> bool {
        let res = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(current)
                        if !current.value().persisted
                            && current.value().addrs == written.addrs
                            && current.value().stored_at
                                == written.stored_at =>
                    {
                        Op::Put(Arc::new(current.value().to_persisted()))
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        matches!(res, CompResult::ReplacedWith(_))
    }

    /// Removes the entry for `key`.
    pub async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await
    }

    /// Removes all entries that are at least `window` old at `now`.
    ///
    /// Returns the number of removed entries.
    pub async fn evict_stale(&self, now: u64, window: Duration) -> usize {
        let mut evicted = 0;
        for (key, _) in self.snapshot() {
            let res = self
                .cache
                .entry_by_ref(key.as_str())
                .and_compute_with(|current| {
                    let op = match current {
                        Some(current)
                            if current.value().is_stale(now, window) =>
                        {
                            Op::Remove
                        }
                        _ => Op::Nop,
                    };
                    std::future::ready(op)
                })
                .await;
            if matches!(res, CompResult::Removed(_)) {
                evicted += 1;
            }
        }
        evicted
    }

    /// Returns a copy of all current entries.
    ///
    /// The snapshot is not atomic with respect to concurrent updates.
    pub fn snapshot(&self) -> Vec<(String, Arc<Entry>)> {
        self.cache
            .iter()
            .map(|(key, entry)| ((*key).clone(), entry))
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.cache.iter().count()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

//------------ unix_now ------------------------------------------------------

/// Returns the current time in seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_addresses_are_absent() {
        let store = Store::new();
        store.put("example.com:80", Vec::new(), false).await;
        assert!(store.get("example.com:80").await.is_none());
        assert!(!store.refresh("example.com:80", Vec::new()).await);
        assert!(store.is_empty());
        assert!(Entry::new(Vec::new(), 0, true).is_none());
    }

    #[tokio::test]
    async fn unchanged_refresh_keeps_persisted_flag() {
        let store = Store::new();
        let list = addrs(&["10.0.0.1:80", "10.0.0.2:80"]);
        store.put("example.com:80", list.clone(), true).await;

        assert!(!store.refresh("example.com:80", list.clone()).await);
        let entry = store.entry("example.com:80").await.unwrap();
        assert!(entry.persisted());

        // Same addresses, different order, is a change.
        let reversed = addrs(&["10.0.0.2:80", "10.0.0.1:80"]);
        assert!(store.refresh("example.com:80", reversed.clone()).await);
        let entry = store.entry("example.com:80").await.unwrap();
        assert!(!entry.persisted());
        assert_eq!(entry.addrs(), reversed.as_slice());
    }

    #[tokio::test]
    async fn mark_persisted_skips_replaced_entries() {
        let store = Store::new();
        store.put("a:1", addrs(&["10.0.0.1:1"]), false).await;
        let written = store.entry("a:1").await.unwrap();

        store.refresh("a:1", addrs(&["10.0.0.2:1"])).await;
        assert!(!store.mark_persisted("a:1", &written).await);
        assert!(!store.entry("a:1").await.unwrap().persisted());

        let written = store.entry("a:1").await.unwrap();
        assert!(store.mark_persisted("a:1", &written).await);
        assert!(store.entry("a:1").await.unwrap().persisted());
        assert!(!store.mark_persisted("a:1", &written).await);
    }

    #[tokio::test]
    async fn eviction_removes_only_old_entries() {
        let store = Store::new();
        let now = unix_now();
        let window = Duration::from_secs(3600);
        let fresh = Entry::new(addrs(&["10.0.0.1:1"]), now - 60, true);
        let old = Entry::new(addrs(&["10.0.0.2:1"]), now - 7200, true);
        store.insert("fresh:1", fresh.unwrap()).await;
        store.insert("old:1", old.unwrap()).await;

        assert_eq!(store.evict_stale(now, window).await, 1);
        assert!(store.get("fresh:1").await.is_some());
        assert!(store.get("old:1").await.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn staleness_boundaries() {
        let entry = Entry::new(addrs(&["10.0.0.1:1"]), 1000, false).unwrap();
        let window = Duration::from_secs(100);
        assert!(!entry.is_stale(1099, window));
        assert!(entry.is_stale(1100, window));
        assert!(!entry.is_stale(10, window));
    }
}

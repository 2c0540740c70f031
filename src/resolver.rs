//! The caching resolver.
//!
//! A [`Resolver`] turns targets of the form `host:port` or URLs into lists
//! of `ip:port` addresses, remembering the last successful answer for each
//! target. Depending on its [`Config`], a lookup either
//!
//! * always resolves the target and then answers from the cache, which
//!   means the cache only helps when resolution fails, or
//! * answers from the cache right away if it has an entry and refreshes
//!   the entry in the background (the cache-first policy).
//!
//! When a resolver is created, the cache is restored from the cache file.
//! A resolver owns up to two background tasks. One evicts entries that
//! have grown older than the staleness window and cleans up the cache
//! file. If persistence is enabled, the other one regularly appends new
//! entries to the file.
//!
//! Resolvers are cheap to clone. All clones share the same cache, so a
//! single resolver should be created and handed to everything needing it.
//! The background tasks end when [`Resolver::shutdown`] is called or the
//! last clone is dropped.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::addr::{join_host_port, normalize, split_host_port};
use crate::config::Config;
use crate::error::Error;
use crate::lookup::{Lookup, SystemLookup};
use crate::persist::{self, CacheFile};
use crate::pool::WorkerPool;
use crate::sched;
use crate::store::Store;

//------------ Resolver ------------------------------------------------------

/// A DNS resolver that serves stale answers.
pub struct Resolver<L = SystemLookup> {
    /// The state shared by all clones.
    inner: Arc<Inner<L>>,
}

/// The shared state of a resolver.
struct Inner<L> {
    /// The configuration.
    config: Config,

    /// The cached resolutions.
    store: Store,

    /// The host name lookup to use.
    lookup: L,

    /// Where background refreshes run.
    pool: WorkerPool,

    /// The cache file.
    file: Arc<CacheFile>,

    /// Stops the scheduled tasks when sent to or dropped.
    stop: watch::Sender<bool>,
}

impl Resolver {
    /// Creates a new resolver using the system resolver.
    ///
    /// The cache is loaded from the cache file whether or not persistence
    /// is enabled. The background tasks are spawned onto the current Tokio
    /// runtime.
    pub async fn new(config: Config) -> Self {
        Self::with_lookup(config, SystemLookup).await
    }
}

impl<L: Lookup + 'static> Resolver<L> {
    /// Creates a new resolver using the given host name lookup.
    pub async fn with_lookup(config: Config, lookup: L) -> Self {
        let store = Store::new();
        let file = Arc::new(CacheFile::new(config.cache_file()));
        file.load(&store, config.stale_after()).await;

        let (stop, stop_rx) = sched::stop_signal();
        if config.persist() {
            let store = store.clone();
            let file = file.clone();
            sched::spawn(
                "flush cache file",
                config.flush_interval(),
                stop_rx.clone(),
                move || {
                    let store = store.clone();
                    let file = file.clone();
                    async move { file.flush(&store).await.map(|_| ()) }
                },
            );
        }
        {
            let store = store.clone();
            let file = file.clone();
            let window = config.stale_after();
            let pending = config.persist();
            sched::spawn(
                "evict stale entries",
                config.evict_interval(),
                stop_rx,
                move || {
                    let store = store.clone();
                    let file = file.clone();
                    async move {
                        persist::evict(&store, &file, window, pending)
                            .await
                            .map(|_| ())
                    }
                },
            );
        }

        let pool = WorkerPool::new("refresh", config.max_parallel());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                lookup,
                pool,
                file,
                stop,
            }),
        }
    }

    /// Resolves the configured targets.
    ///
    /// This is the same as calling [`lookup`][Self::lookup] with
    /// [`Config::targets`].
    pub async fn lookup_host(&self) -> Result<Vec<String>, Error> {
        self.lookup(self.inner.config.targets()).await
    }

    /// Resolves `targets`.
    ///
    /// Returns one entry per target that has addresses, in the order of
    /// `targets`. Each entry is the list of addresses of the target as
    /// `ip:port` joined by commas. Targets that can't be resolved and
    /// have nothing cached are left out.
    ///
    /// Fails without resolving anything if a target looks like a URL but
    /// isn't one.
    pub async fn lookup<S: AsRef<str>>(
        &self,
        targets: &[S],
    ) -> Result<Vec<String>, Error> {
        let keys = targets
            .iter()
            .map(|target| normalize(target.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut res = Vec::with_capacity(keys.len());
        for key in keys {
            if self.inner.config.cache_first() {
                if let Some(addrs) = self.inner.store.get(&key).await {
                    trace!("cache hit for {key}");
                    res.push(addrs.join(","));
                    self.refresh_in_background(key);
                    continue;
                }
            }

            self.inner.resolve_and_refresh(&key).await;
            match self.inner.store.get(&key).await {
                Some(addrs) => res.push(addrs.join(",")),
                None => debug!("no addresses for {key}"),
            }
        }
        Ok(res)
    }

    /// Submits a refresh of `key` to the worker pool.
    fn refresh_in_background(&self, key: String) {
        let inner = self.inner.clone();
        self.inner.pool.submit(async move {
            inner.resolve_and_refresh(&key).await;
        })
    }
}

impl<L> Resolver<L> {
    /// Returns the configuration of the resolver.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the cache store of the resolver.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Returns the number of background refreshes submitted so far.
    pub fn refreshes_submitted(&self) -> usize {
        self.inner.pool.submitted()
    }

    /// Writes all new entries to the cache file right away.
    ///
    /// Returns the number of written entries, which is always zero if
    /// persistence is disabled.
    pub async fn flush(&self) -> Result<usize, Error> {
        if !self.inner.config.persist() {
            return Ok(0);
        }
        self.inner.file.flush(&self.inner.store).await
    }

    /// Runs an eviction pass right away.
    ///
    /// This also rewrites the cache file. If persistence is disabled, only
    /// entries loaded from the file and still unchanged are kept in it.
    /// Returns the number of evicted entries.
    pub async fn evict(&self) -> Result<usize, Error> {
        persist::evict(
            &self.inner.store,
            &self.inner.file,
            self.inner.config.stale_after(),
            self.inner.config.persist(),
        )
        .await
    }

    /// Stops all background activity.
    ///
    /// The scheduled tasks end and refreshes that haven't started yet are
    /// dropped. Lookups keep working but the cache file isn't updated
    /// anymore and cache-first lookups stop refreshing their entries.
    pub fn shutdown(&self) {
        self.inner.stop.send_replace(true);
        self.inner.pool.close();
    }
}

impl<L> Clone for Resolver<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

//------------ Inner ---------------------------------------------------------

impl<L: Lookup> Inner<L> {
    /// Resolves `key` and updates the cache if the answer has changed.
    ///
    /// Failures leave the cache alone. Returns whether the cache was
    /// updated.
    async fn resolve_and_refresh(&self, key: &str) -> bool {
        let Some((host, port)) = split_host_port(key) else {
            debug!("cannot resolve '{key}': not of the form host:port");
            return false;
        };
        let ips = match timeout(
            self.config.lookup_timeout(),
            self.lookup.lookup_ip(host),
        )
        .await
        {
            Ok(Ok(ips)) => ips,
            Ok(Err(err)) => {
                debug!("resolving {host} failed: {err}");
                return false;
            }
            Err(_) => {
                debug!("resolving {host} timed out");
                return false;
            }
        };

        let mut addrs = Vec::with_capacity(ips.len());
        for ip in ips {
            let addr = join_host_port(ip, port);
            if !addrs.contains(&addr) {
                addrs.push(addr)
            }
        }
        if addrs.is_empty() {
            debug!("resolving {host} returned no addresses");
            return false;
        }

        let updated = self.store.refresh(key, addrs).await;
        if updated {
            debug!("updated addresses for {key}");
        }
        updated
    }
}

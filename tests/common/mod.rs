#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dns_stale_cache::lookup::{Lookup, LookupResult};
use dns_stale_cache::Config;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Setup logging of events reported by the resolver and the test suite.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to only see what the persistence passes are doing:
///   RUST_LOG=dns_stale_cache::persist=TRACE
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

//------------ FakeLookup ----------------------------------------------------

/// A host name lookup answering from a table.
///
/// Unknown hosts fail with `NotFound`. Every answer can be delayed to
/// simulate a slow resolver.
#[derive(Debug, Default)]
pub struct FakeLookup {
    answers: Mutex<HashMap<String, Vec<IpAddr>>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    hosts: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, host: &str, addrs: &[&str]) {
        let addrs = addrs.iter().map(|addr| addr.parse().unwrap()).collect();
        self.answers.lock().unwrap().insert(host.into(), addrs);
    }

    pub fn forget(&self, host: &str) {
        self.answers.lock().unwrap().remove(host);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }
}

impl Lookup for FakeLookup {
    fn lookup_ip<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().unwrap().push(host.into());
        let delay = *self.delay.lock().unwrap();
        let answer = self.answers.lock().unwrap().get(host).cloned();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            answer.ok_or_else(|| io::ErrorKind::NotFound.into())
        })
    }
}

/// Turns a list of string slices into owned strings.
pub fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Returns a default config keeping its cache file in `dir`.
///
/// The flush interval is long enough for tests to flush by hand.
pub fn scratch_config(dir: &TempDir) -> Config {
    let mut config = Config::new();
    config.set_cache_file(dir.path().join("ip_info"));
    config.set_flush_interval(Duration::from_secs(3600));
    config
}

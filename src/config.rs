//! Configuration of a resolver.
//!
//! A [`Config`] is assembled by the owner of a
//! [`Resolver`](crate::resolver::Resolver) before construction and is
//! immutable afterwards. Every duration and size is clamped into a range
//! documented at its setter, so a configuration can never disable a timer
//! by accident.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::cmp;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::home;

//------------ Limits --------------------------------------------------------

/// Limit on the time a single live resolution may take.
const LOOKUP_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(1),
    Duration::from_millis(10),
    Duration::from_secs(60),
);

/// Limit on how old an entry may get before it is evicted.
///
/// Also bounds the eviction interval.
const STALE_AFTER: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(24 * 3600),
    Duration::from_secs(1),
    Duration::from_secs(30 * 24 * 3600),
);

/// Nominal interval between two flushes of the cache file.
const FLUSH_INTERVAL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(3),
    Duration::from_millis(10),
    Duration::from_secs(3600),
);

/// Bounds on the number of concurrent background refreshes.
///
/// The default is computed from the available parallelism.
const MAX_PARALLEL: DefMinMax<usize> = DefMinMax::new(0, 1, 65536);

/// Background refreshes per available CPU.
const PARALLEL_PER_CPU: usize = 10;

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a config variable.
#[derive(Clone, Copy)]
struct DefMinMax<T> {
    /// The default value.
    def: T,

    /// The minimum value.
    min: T,

    /// The maximum value.
    max: T,
}

impl<T: Copy + Ord> DefMinMax<T> {
    /// Creates a new value.
    const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    fn limit(self, value: T) -> T {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Config --------------------------------------------------------

/// Configuration of a resolver.
#[derive(Clone, Debug)]
pub struct Config {
    /// Targets resolved by [`Resolver::lookup_host`].
    ///
    /// [`Resolver::lookup_host`]: crate::resolver::Resolver::lookup_host
    targets: Vec<String>,

    /// Upper bound on a single live resolution.
    lookup_timeout: Duration,

    /// Serve warm entries first and refresh them in the background.
    cache_first: bool,

    /// Keep the cache in a file across restarts.
    persist: bool,

    /// Location of the cache file, if not the default one.
    cache_file: Option<PathBuf>,

    /// Age after which an entry is evicted.
    stale_after: Duration,

    /// Nominal interval between flushes of the cache file.
    flush_interval: Duration,

    /// Nominal interval between eviction passes, if not `stale_after`.
    evict_interval: Option<Duration>,

    /// Maximum number of concurrent background refreshes.
    max_parallel: usize,
}

impl Config {
    /// Creates a new config with default values.
    ///
    /// The default values are documented at the relevant set_* methods.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new config with default values resolving `targets`.
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut res = Self::new();
        res.set_targets(targets);
        res
    }

    /// Sets the targets resolved by `lookup_host`.
    ///
    /// A target is either `host:port` or a URL such as
    /// `redis://example.com:6379/0`. The default is no targets.
    pub fn set_targets<I, S>(&mut self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
    }

    /// Sets the time limit for a single live resolution.
    ///
    /// The value has to be at least 10 milliseconds, at most 60 seconds
    /// and the default is one second.
    pub fn set_lookup_timeout(&mut self, value: Duration) {
        self.lookup_timeout = LOOKUP_TIMEOUT.limit(value)
    }

    /// Enables or disables the cache-first policy.
    ///
    /// When disabled, every lookup resolves live and refreshes the cache.
    /// When enabled, a lookup returns a cached entry right away and
    /// refreshes it in the background. The default is disabled.
    pub fn set_cache_first(&mut self, value: bool) {
        self.cache_first = value
    }

    /// Enables or disables writing new answers to the cache file.
    ///
    /// The cache file is read when the resolver is created and cleaned up
    /// by eviction either way. The default is disabled.
    pub fn set_persist(&mut self, value: bool) {
        self.persist = value
    }

    /// Sets the location of the cache file.
    ///
    /// The default is a file called `ip_info` in the home directory of
    /// the current user.
    pub fn set_cache_file(&mut self, path: impl Into<PathBuf>) {
        self.cache_file = Some(path.into())
    }

    /// Sets the age after which a cache entry is evicted.
    ///
    /// The value has to be at least one second, at most 30 days and the
    /// default is 24 hours.
    pub fn set_stale_after(&mut self, value: Duration) {
        self.stale_after = STALE_AFTER.limit(value)
    }

    /// Sets the nominal interval between flushes of the cache file.
    ///
    /// The value has to be at least 10 milliseconds, at most one hour and
    /// the default is three seconds.
    pub fn set_flush_interval(&mut self, value: Duration) {
        self.flush_interval = FLUSH_INTERVAL.limit(value)
    }

    /// Sets the nominal interval between eviction passes.
    ///
    /// The value uses the same range as [`set_stale_after`] and defaults
    /// to the stale-after duration.
    ///
    /// [`set_stale_after`]: Self::set_stale_after
    pub fn set_evict_interval(&mut self, value: Duration) {
        self.evict_interval = Some(STALE_AFTER.limit(value))
    }

    /// Sets the maximum number of concurrent background refreshes.
    ///
    /// The value has to be at least 1, at most 65536 and the default is
    /// ten times the available parallelism.
    pub fn set_max_parallel(&mut self, value: usize) {
        self.max_parallel = MAX_PARALLEL.limit(value)
    }
}

impl Config {
    /// Returns the configured targets.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Returns the time limit for a single live resolution.
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Returns whether the cache-first policy is enabled.
    pub fn cache_first(&self) -> bool {
        self.cache_first
    }

    /// Returns whether the cache is kept in a file.
    pub fn persist(&self) -> bool {
        self.persist
    }

    /// Returns the location of the cache file.
    ///
    /// If none was set, the default location is resolved anew.
    pub fn cache_file(&self) -> PathBuf {
        match self.cache_file {
            Some(ref path) => path.clone(),
            None => home::cache_file_path(),
        }
    }

    /// Returns the age after which an entry is evicted.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Returns the nominal interval between flushes.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Returns the nominal interval between eviction passes.
    pub fn evict_interval(&self) -> Duration {
        self.evict_interval.unwrap_or(self.stale_after)
    }

    /// Returns the maximum number of concurrent background refreshes.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            lookup_timeout: LOOKUP_TIMEOUT.default(),
            cache_first: false,
            persist: false,
            cache_file: None,
            stale_after: STALE_AFTER.default(),
            flush_interval: FLUSH_INTERVAL.default(),
            evict_interval: None,
            max_parallel: default_max_parallel(),
        }
    }
}

/// Returns the default number of concurrent background refreshes.
fn default_max_parallel() -> usize {
    let cpus = thread::available_parallelism().map_or(1, |n| n.get());
    MAX_PARALLEL.limit(PARALLEL_PER_CPU.saturating_mul(cpus))
}

//============ Testing =======================================================

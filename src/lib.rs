//! A stale-tolerant DNS resolution cache.
//!
//! This crate provides a resolver for clients of network services such as
//! databases or message queues that connect to a small, fixed set of
//! targets. Instead of paying for a full DNS lookup on every connection
//! attempt, the [`Resolver`] remembers the last successful answer for each
//! target and can hand it out immediately while refreshing it in the
//! background. Resolution itself is left to the system resolver.
//!
//! Answers can optionally be kept in a file in the user's home directory
//! so that a restarted process doesn't begin with a cold cache.
//!
//! # Modules
//!
//! * [resolver] contains the [`Resolver`] itself,
//! * [config] its [`Config`],
//! * [store] the concurrent in-memory cache,
//! * [persist] the cache file format and the persistence passes,
//! * [home] the default location of the cache file,
//! * [sched] the jittered scheduler driving these passes,
//! * [pool] the bounded pool running background refreshes,
//! * [lookup] the seam to the system resolver,
//! * [addr] the handling of target addresses, and
//! * [dial] helpers for clients connecting to resolved targets.
//!
//! # Example
//!
//! ```no_run
//! use dns_stale_cache::{Config, Resolver};
//!
//! # async fn run() -> Result<(), dns_stale_cache::Error> {
//! let mut config = Config::with_targets(["redis://example.com:6379/0"]);
//! config.set_cache_first(true);
//! config.set_persist(true);
//!
//! let resolver = Resolver::new(config).await;
//! for group in resolver.lookup_host().await? {
//!     println!("{group}");
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod addr;
pub mod config;
pub mod dial;
pub mod error;
pub mod home;
pub mod lookup;
pub mod persist;
pub mod pool;
pub mod resolver;
pub mod sched;
pub mod store;

pub use self::config::Config;
pub use self::error::Error;
pub use self::resolver::Resolver;

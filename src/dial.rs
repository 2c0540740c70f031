//! Helpers for clients connecting to resolved targets.
//!
//! Clients of databases and message queues typically want a connection to
//! one address of a target rather than a list of addresses. The functions
//! in this module sit between such clients and a [`Resolver`]. They fall
//! back to the unresolved target when the resolver has nothing to offer.

use std::env;
use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::lookup::Lookup;
use crate::resolver::Resolver;

//------------ connect -------------------------------------------------------

/// Opens a TCP connection to `addr`.
///
/// The target is resolved through `resolver`. If that yields addresses,
/// they are tried in order and the first successful connection is
/// returned. If all of them fail, the error of the first attempt is
/// returned. If the resolver yields nothing, `addr` itself is dialed.
///
/// Each connection attempt is bounded by `connect_timeout` if given.
pub async fn connect<L: Lookup + 'static>(
    resolver: &Resolver<L>,
    addr: &str,
    connect_timeout: Option<Duration>,
) -> io::Result<TcpStream> {
    let groups = match resolver.lookup(&[addr]).await {
        Ok(groups) => groups,
        Err(err) => {
            debug!("not resolving {addr}: {err}");
            Vec::new()
        }
    };
    let candidates: Vec<&str> = match groups.as_slice() {
        [group] if !group.is_empty() => group.split(',').collect(),
        _ => Vec::new(),
    };
    if candidates.is_empty() {
        return dial(addr, connect_timeout).await;
    }

    let mut first_err = None;
    for candidate in candidates {
        match dial(candidate, connect_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("connecting to {candidate} for {addr} failed: {err}");
                if first_err.is_none() {
                    first_err = Some(err)
                }
            }
        }
    }
    Err(first_err.unwrap_or_else(|| io::ErrorKind::NotFound.into()))
}

/// Connects to a single address.
async fn dial(
    addr: &str,
    connect_timeout: Option<Duration>,
) -> io::Result<TcpStream> {
    match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
        None => TcpStream::connect(addr).await,
    }
}

//------------ primary_addrs -------------------------------------------------

/// Returns the first address of every configured target.
///
/// This suits clients that take a list of servers and need a single
/// address per server. If none of the targets resolves, the addresses are
/// taken from the environment variable `fallback_env` instead, which holds
/// a list separated by semicolons. If that isn't set either, the result is
/// empty. A target list that can't be parsed yields an empty result
/// without consulting the environment.
pub async fn primary_addrs<L: Lookup + 'static>(
    resolver: &Resolver<L>,
    fallback_env: &str,
) -> Vec<String> {
    let groups = match resolver.lookup_host().await {
        Ok(groups) => groups,
        Err(err) => {
            debug!("not resolving configured targets: {err}");
            return Vec::new();
        }
    };
    let res: Vec<String> = groups
        .iter()
        .filter_map(|group| group.split(',').next())
        .filter(|addr| !addr.is_empty())
        .map(Into::into)
        .collect();
    if !res.is_empty() {
        return res;
    }
    match env::var(fallback_env) {
        Ok(list) if !list.is_empty() => {
            list.split(';').map(Into::into).collect()
        }
        _ => Vec::new(),
    }
}

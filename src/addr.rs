//! Handling of target addresses.
//!
//! Targets are given either as `host:port` or as a URL. Both are reduced to
//! a normalized `host:port` key which is what the cache is indexed by.
//! Resolved addresses are stored as `ip:port` strings with IPv6 addresses
//! in brackets.

use std::net::IpAddr;

use url::Url;

use crate::error::Error;

//------------ normalize -----------------------------------------------------

/// Stand-in scheme for scheme-relative targets. It has no default port.
const NO_SCHEME: &str = "tcp";

/// Returns the cache key for a target.
///
/// A target containing `//` is parsed as a URL and reduced to its host and
/// port. When the URL doesn't name a port, the default port of its scheme
/// is used if the scheme has one. A target starting with `//` is a URL
/// without a scheme and keeps only the port it names. Anything else is
/// returned unchanged.
pub fn normalize(target: &str) -> Result<String, Error> {
    if !target.contains("//") {
        return Ok(target.into());
    }
    let url = match target.strip_prefix("//") {
        Some(authority) => Url::parse(&format!("{NO_SCHEME}://{authority}")),
        None => Url::parse(target),
    };
    let url = url.map_err(|err| Error::InvalidUrl {
        target: target.into(),
        err,
    })?;
    let host = url.host_str().unwrap_or_default();
    Ok(match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.into(),
    })
}

//------------ split_host_port -----------------------------------------------

/// Splits a `host:port` key into host and port.
///
/// IPv6 hosts must be enclosed in brackets, which are removed. Returns
/// `None` if there is no port or the host contains a stray colon.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        let port = rest.strip_prefix(':')?;
        if host.is_empty() || port.contains(':') {
            return None;
        }
        return Some((host, port));
    }
    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some((host, port))
}

//------------ join_host_port ------------------------------------------------

/// Joins an address and a port into the `ip:port` form used by the cache.
pub fn join_host_port(addr: IpAddr, port: &str) -> String {
    match addr {
        IpAddr::V4(addr) => format!("{addr}:{port}"),
        IpAddr::V6(addr) => format!("[{addr}]:{port}"),
    }
}

//============ Testing =======================================================

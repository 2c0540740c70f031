//! Looking up host names.
//!
//! The resolver doesn't talk DNS itself. Instead it asks an implementation
//! of [`Lookup`] for the addresses of a host name. The default
//! implementation, [`SystemLookup`], uses the resolver of the operating
//! system via Tokio.

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;

//------------ Lookup --------------------------------------------------------

/// The result of a host name lookup.
pub type LookupResult = io::Result<Vec<IpAddr>>;

/// Trait for looking up the addresses of a host name.
///
/// Implementations don't need to apply a timeout. The resolver bounds
/// every lookup by its configured lookup timeout and drops the future
/// once that has passed.
pub trait Lookup: Debug + Send + Sync {
    /// Looks up the addresses of `host`.
    ///
    /// The host is given without brackets if it is an IPv6 address.
    fn lookup_ip<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>>;
}

impl<T: Lookup + ?Sized> Lookup for Arc<T> {
    fn lookup_ip<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        self.as_ref().lookup_ip(host)
    }
}

//------------ SystemLookup --------------------------------------------------

/// Host name lookup through the system resolver.
///
/// Literal addresses are returned as they are. Duplicate addresses are
/// removed, keeping the order in which the system returned them.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLookup;

impl Lookup for SystemLookup {
    fn lookup_ip<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        Box::pin(async move {
            let mut res = Vec::new();
            for addr in tokio::net::lookup_host((host, 0)).await? {
                if !res.contains(&addr.ip()) {
                    res.push(addr.ip())
                }
            }
            Ok(res)
        })
    }
}

//============ Testing =======================================================

//! DNS lookups used for pool discovery.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{Resolver, TokioResolver};
use tracing::warn;

/// Forward and reverse name resolution.
pub trait DnsResolver: Send + Sync {
    /// Returns the IPv4 and IPv6 addresses of `host`.
    fn resolve(&self, host: &str) -> impl Future<Output = io::Result<Vec<IpAddr>>> + Send;

    /// Returns the canonical host name of `addr`.
    fn reverse(&self, addr: IpAddr) -> impl Future<Output = io::Result<String>> + Send;
}

/// Resolver backed by the system DNS configuration.
#[derive(Clone)]
pub struct SystemResolver {
    inner: TokioResolver,
}

impl SystemResolver {
    /// Creates a resolver from the system configuration.
    ///
    /// Falls back to the built-in defaults if the system configuration
    /// cannot be read.
    pub fn new() -> Self {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf().unwrap_or_else(|e| {
            warn!("reading system resolver configuration failed: {}", e);
            (ResolverConfig::default(), ResolverOpts::default())
        });
        let inner = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(lookup_options(opts))
            .build();
        Self { inner }
    }
}

/// Asks for A and AAAA records alike.
///
/// Pool discovery needs every address of a name, not the first family that
/// answers, so that v4-only and v6-only members are both found.
fn lookup_options(mut opts: ResolverOpts) -> ResolverOpts {
    opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    opts
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let lookup = self.inner.lookup_ip(host).await.map_err(io::Error::other)?;
        Ok(lookup.iter().collect())
    }

    async fn reverse(&self, addr: IpAddr) -> io::Result<String> {
        let lookup = self.inner.reverse_lookup(addr).await.map_err(io::Error::other)?;
        let name = lookup
            .iter()
            .next()
            .map(|name| name.to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no PTR record for {}", addr)))?;
        Ok(name.trim_end_matches('.').to_string())
    }
}

/// In-memory resolver with fixed answers.
///
/// Useful for offline operation and tests. Names that are not configured
/// fail to resolve.
#[derive(Debug, Default)]
pub struct StaticResolver {
    forward: HashMap<String, Vec<IpAddr>>,
    reverse: HashMap<IpAddr, String>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds forward records for `host`.
    pub fn with_host(mut self, host: &str, addrs: &[IpAddr]) -> Self {
        self.forward
            .entry(host.to_ascii_lowercase())
            .or_default()
            .extend_from_slice(addrs);
        self
    }

    /// Adds a reverse record for `addr`.
    pub fn with_reverse(mut self, addr: IpAddr, name: &str) -> Self {
        self.reverse.insert(addr, name.to_string());
        self
    }

    /// Number of forward lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl DnsResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.forward
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host '{}'", host)))
    }

    async fn reverse(&self, addr: IpAddr) -> io::Result<String> {
        self.reverse
            .get(&addr)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no PTR record for {}", addr)))
    }
}

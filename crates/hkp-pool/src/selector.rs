use std::sync::Arc;

use hkp_common::error::Result;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::host::AddressFamilies;
use crate::host_table::{HostTable, HostTableSnapshot, RegistryConfig, LOCALHOST};
use crate::resolver::{DnsResolver, SystemResolver};

/// Maps logical keyserver names to the concrete server to talk to.
///
/// The first time a name is selected it is resolved and every address is
/// reverse-resolved; if that yields other host names the name is treated
/// as a round-robin pool of those hosts. A pool sticks to one randomly
/// chosen member until the member is reported dead.
///
/// DNS lookups run without holding the table lock; only the final update
/// of the table is done under it. Two tasks selecting the same pool at the
/// same time may therefore end up on different members.
pub struct HostSelector<R = SystemResolver> {
    table: Arc<RwLock<HostTable>>,
    resolver: Arc<R>,
}

impl<R> Clone for HostSelector<R> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl HostSelector<SystemResolver> {
    /// Creates a selector using the system resolver.
    pub fn system() -> Self {
        Self::new(SystemResolver::new())
    }
}

impl<R: DnsResolver> HostSelector<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_config(resolver, RegistryConfig::default())
    }

    pub fn with_config(resolver: R, config: RegistryConfig) -> Self {
        Self {
            table: Arc::new(RwLock::new(HostTable::new(config))),
            resolver: Arc::new(resolver),
        }
    }

    /// Shared handle to the host table.
    pub fn table(&self) -> Arc<RwLock<HostTable>> {
        Arc::clone(&self.table)
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Returns the host name to use for `name`.
    ///
    /// An empty name selects [`LOCALHOST`].
    ///
    /// # Errors
    ///
    /// Returns `HkpError::NoHost` if the host, or every member of the pool,
    /// has been reported dead.
    pub async fn select(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Ok(LOCALHOST.to_string());
        }

        let known = self.table.read().await.find(name);
        let idx = match known {
            Some(idx) => idx,
            None => self.register(name).await?,
        };

        let mut table = self.table.write().await;
        let mut rng = rand::thread_rng();
        let host = table.map_host(idx, &mut rng)?;
        debug!("selected host '{}' for '{}'", host, name);
        Ok(host)
    }

    /// Reports that `name` failed to respond.
    ///
    /// The host is never selected again, neither directly nor as a pool
    /// member.
    pub async fn report_dead(&self, name: &str) -> bool {
        self.table.write().await.mark_dead(name)
    }

    pub async fn is_dead(&self, name: &str) -> bool {
        self.table.read().await.is_dead(name)
    }

    pub async fn find(&self, name: &str) -> Option<usize> {
        self.table.read().await.find(name)
    }

    pub async fn snapshot(&self) -> HostTableSnapshot {
        self.table.read().await.snapshot()
    }

    /// Logs the host table.
    pub async fn debug_dump(&self) -> Vec<String> {
        self.table.read().await.debug_dump()
    }

    /// Adds an unseen name to the table together with its pool members.
    async fn register(&self, name: &str) -> Result<usize> {
        let members = self.discover_pool(name).await;

        let mut table = self.table.write().await;
        if let Some(idx) = table.find(name) {
            // registered by a concurrent selection
            return Ok(idx);
        }
        let idx = table.insert(name)?;
        table.commit_pool(idx, &members);
        Ok(idx)
    }

    /// Resolves `name` and maps each address back to a host name.
    ///
    /// Failed lookups are logged and skipped.
    async fn discover_pool(&self, name: &str) -> Vec<(String, AddressFamilies)> {
        let addrs = match self.resolver.resolve(name).await {
            Ok(addrs) => addrs,
            Err(e) => {
                info!("resolving '{}' failed: {}", name, e);
                return Vec::new();
            }
        };

        let mut members: Vec<(String, AddressFamilies)> = Vec::new();
        for addr in addrs {
            debug!("resolver returned {} for '{}'", addr, name);
            let host = match self.resolver.reverse(addr).await {
                Ok(host) => host,
                Err(e) => {
                    info!("reverse lookup failed while checking '{}': {}", name, e);
                    continue;
                }
            };
            info!("reverse lookup returned for '{}': '{}'", name, host);

            let families = AddressFamilies {
                v4: addr.is_ipv4(),
                v6: addr.is_ipv6(),
            };
            match members.iter_mut().find(|(m, _)| m.eq_ignore_ascii_case(&host)) {
                Some((_, known)) => known.merge(families),
                None => members.push((host, families)),
            }
        }
        members
    }
}

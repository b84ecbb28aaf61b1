//! HKP Host Pool
//!
//! Keeps track of every keyserver host the client has talked to and decides
//! which concrete server a request goes to:
//!
//! - [`host_table`] - index-addressed table of hosts with pool links and
//!   dead flags
//! - [`resolver`] - forward/reverse DNS used to discover round-robin pools
//! - [`selector`] - sticky random selection among live pool members
//!
//! # Example
//!
//! ```no_run
//! use hkp_pool::HostSelector;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let selector = HostSelector::system();
//! let host = selector.select("keys.example.org").await?;
//!
//! // the server did not answer: never pick it again
//! selector.report_dead(&host).await;
//! # Ok(())
//! # }
//! ```

pub mod host;
pub mod host_table;
pub mod resolver;
pub mod selector;

pub use host::{AddressFamilies, HostEntry};
pub use host_table::{HostSnapshot, HostTable, HostTableSnapshot, RegistryConfig, LOCALHOST};
pub use resolver::{DnsResolver, StaticResolver, SystemResolver};
pub use selector::HostSelector;

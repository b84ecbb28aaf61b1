//! HKP Client
//!
//! Talks the HTTP Keyserver Protocol to OpenPGP keyservers:
//!
//! - [`client`] - the search, get and put operations
//! - [`driver`] - a single HTTP exchange with bounded redirect following
//! - [`stream`] - peekable streaming access to response bodies
//! - [`transport`] - the HTTP seam and its hyper implementation
//!
//! Host selection and failover come from `hkp-pool`; request URLs always
//! name the host the selector picked, never the pool name itself.

pub mod client;
pub mod driver;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::{get_term, help, search_term, HkpClient, HostPart};
pub use driver::{ClientConfig, PostData, RequestDriver, FORM_URLENCODED};
pub use stream::{full_body, KeyStream, ResponseBody};
pub use transport::{HttpTransport, HyperTransport, TransportError, DEFAULT_TIMEOUT};

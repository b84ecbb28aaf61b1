//! HKP Common Types
//!
//! Shared building blocks of the HKP keyserver client:
//!
//! - [`error`] - the error taxonomy used by every crate in the workspace
//! - [`keyspec`] - classification of user supplied key specifiers
//! - [`escape`] - the percent escaping keyservers expect
//! - [`armor`] - OpenPGP ASCII armor for key uploads
//! - [`uri`] - keyserver addresses and their scheme/port mapping

pub mod armor;
pub mod error;
pub mod escape;
pub mod keyspec;
pub mod uri;

pub use armor::armor;
pub use error::{HkpError, Result};
pub use escape::escape;
pub use keyspec::KeySpec;
pub use uri::{KeyserverUri, Scheme};

//! Keyserver addresses.

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::{HkpError, Result};

/// Default port of plain HKP.
pub const HKP_PORT: u16 = 11371;

/// Default port of HKP over TLS.
pub const HKPS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Hkp,
    Http,
    Hkps,
    Https,
}

impl Scheme {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hkp" => Some(Scheme::Hkp),
            "http" => Some(Scheme::Http),
            "hkps" => Some(Scheme::Hkps),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Hkp => "hkp",
            Scheme::Http => "http",
            Scheme::Hkps => "hkps",
            Scheme::Https => "https",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Hkps | Scheme::Https)
    }

    /// The scheme actually put on the wire.
    pub fn http_scheme(&self) -> &'static str {
        if self.is_tls() {
            "https"
        } else {
            "http"
        }
    }

    pub fn default_port(&self) -> u16 {
        if self.is_tls() {
            HKPS_PORT
        } else {
            HKP_PORT
        }
    }
}

/// A parsed keyserver address such as `hkp://keys.example.org`.
///
/// The host is kept exactly as given; it names either a single server or a
/// round-robin pool and is mapped to a concrete server at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyserverUri {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
}

impl KeyserverUri {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parses a keyserver address.
    ///
    /// A bare host name is taken as `hkp://<host>`.
    ///
    /// # Errors
    ///
    /// Returns [`HkpError::InvalidUri`] if the text is not a URL or uses a
    /// scheme other than `hkp`, `hkps`, `http` or `https`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let owned;
        let text = if input.contains("://") {
            input
        } else {
            owned = format!("hkp://{}", input);
            &owned
        };

        let url = Url::parse(text)?;
        let scheme = Scheme::from_name(url.scheme())
            .ok_or_else(|| HkpError::InvalidUri(format!("unsupported scheme '{}'", url.scheme())))?;
        let host = match url.host() {
            Some(Host::Domain(name)) => name.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };
        let port = explicit_port(&url, text);

        Ok(Self { scheme, host, port })
    }

    /// Port used for requests: the explicit one or the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }
}

/// The port written in `text`, if any.
///
/// `Url::port` drops a port equal to the URL scheme's default, so `:80` on
/// an `http` URL is recovered from the authority here. Without it the
/// request would fall back to the HKP default instead.
fn explicit_port(url: &Url, text: &str) -> Option<u16> {
    url.port().or_else(|| {
        let default = url.port_or_known_default()?;
        let authority = text.split_once("://")?.1;
        let authority = authority.split(['/', '?', '#']).next()?;
        let host_port = authority.rsplit('@').next()?;
        let (_, port) = host_port.rsplit_once(':')?;
        if port.contains(']') {
            return None;
        }
        (port.parse::<u16>().ok() == Some(default)).then_some(default)
    })
}

impl FromStr for KeyserverUri {
    type Err = HkpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyserverUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]", self.scheme.name(), self.host)?;
        } else {
            write!(f, "{}://{}", self.scheme.name(), self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

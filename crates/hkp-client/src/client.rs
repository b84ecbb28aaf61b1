use hkp_common::armor::armor;
use hkp_common::error::{HkpError, Result};
use hkp_common::escape::escape;
use hkp_common::keyspec::{to_upper_hex, KeySpec};
use hkp_common::uri::{KeyserverUri, Scheme};
use hkp_pool::{DnsResolver, HostSelector, SystemResolver};
use http::Method;
use tracing::{debug, error};

use crate::driver::{ClientConfig, PostData, RequestDriver};
use crate::stream::KeyStream;
use crate::transport::{HttpTransport, HyperTransport};

const HELP_TEXT: &str = "Handler for HKP URLs:\n  hkp://\nSupported methods: search, get, put\n";
const HELP_SCHEMES: &str = "  hkp";

/// Scheme, selected host and port of a request, e.g. `http://a.example.net:11371`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPart {
    /// URL prefix without a trailing slash.
    pub base: String,
    /// Host chosen by the selector; failures are reported against it.
    pub host: String,
}

/// HKP keyserver client.
///
/// Every request goes to a host picked by the [`HostSelector`], so a pool
/// name in the keyserver URI is transparently mapped to one of its members.
/// When an operation fails with an error for which
/// [`HkpError::is_host_failure`] holds, the caller may pass the failing
/// host to [`HkpClient::report_dead`]; later requests then avoid it.
///
/// # Example
///
/// ```no_run
/// use hkp_client::{ClientConfig, HkpClient};
/// use hkp_common::KeyserverUri;
///
/// # async fn example() -> hkp_common::Result<()> {
/// let client = HkpClient::new(ClientConfig::default());
/// let uri = KeyserverUri::parse("hkp://keys.example.org")?;
/// let mut listing = client.search(&uri, "alice@example.org").await?;
/// let text = listing.read_to_end().await?;
/// # Ok(())
/// # }
/// ```
pub struct HkpClient<T = HyperTransport, R = SystemResolver> {
    driver: RequestDriver<T>,
    selector: HostSelector<R>,
}

impl HkpClient<HyperTransport, SystemResolver> {
    /// Creates a client using hyper and the system resolver.
    pub fn new(config: ClientConfig) -> Self {
        let transport = HyperTransport::new(config.request_timeout);
        Self::with_parts(transport, HostSelector::system(), config)
    }
}

impl<T: HttpTransport, R: DnsResolver> HkpClient<T, R> {
    pub fn with_parts(transport: T, selector: HostSelector<R>, config: ClientConfig) -> Self {
        Self {
            driver: RequestDriver::new(transport, config),
            selector,
        }
    }

    pub fn selector(&self) -> &HostSelector<R> {
        &self.selector
    }

    pub fn driver(&self) -> &RequestDriver<T> {
        &self.driver
    }

    /// Builds the scheme, host and port part of a request URL.
    ///
    /// `hkp` and `http` use plain HTTP on port 11371, `hkps` and `https`
    /// use TLS on port 443; an explicit port in `uri` wins.
    pub async fn host_part(&self, uri: &KeyserverUri) -> Result<HostPart> {
        let host = self.selector.select(&uri.host).await?;
        let port = uri.effective_port();
        let base = if host.contains(':') {
            format!("{}://[{}]:{}", uri.scheme.http_scheme(), host, port)
        } else {
            format!("{}://{}:{}", uri.scheme.http_scheme(), host, port)
        };
        Ok(HostPart { base, host })
    }

    /// Searches the keyserver for keys matching `pattern`.
    ///
    /// The stream is positioned at the start of the machine readable
    /// listing.
    pub async fn search(&self, uri: &KeyserverUri, pattern: &str) -> Result<KeyStream> {
        let spec = KeySpec::parse(pattern)?;
        self.search_spec(uri, &spec).await
    }

    /// Like [`HkpClient::search`] for an already classified specifier.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedEncoding` if the server answers with an HTML
    /// page and with `Eof` if it answers with nothing at all.
    pub async fn search_spec(&self, uri: &KeyserverUri, spec: &KeySpec) -> Result<KeyStream> {
        let term = search_term(spec)?;
        let part = self.host_part(uri).await?;
        let url = format!(
            "{}/pks/lookup?op=index&options=mr&search={}",
            part.base,
            escape(&term)
        );
        debug!("searching '{}' for '{}'", part.host, term);

        let mut stream = self.driver.send(Method::GET, &url, &part.host, None).await?;

        match stream.peek_byte().await {
            Ok(Some(b'<')) => {
                // most likely an HTML error page
                error!("server '{}' returned an HTML document", part.host);
                Err(HkpError::UnsupportedEncoding)
            }
            Ok(Some(_)) => Ok(stream),
            Ok(None) => {
                error!("error reading response: {}", HkpError::Eof);
                Err(HkpError::Eof)
            }
            Err(e) => {
                error!("error reading response: {}", e);
                Err(e)
            }
        }
    }

    /// Fetches the key named by `keyspec`.
    pub async fn get(&self, uri: &KeyserverUri, keyspec: &str) -> Result<KeyStream> {
        let spec = KeySpec::parse(keyspec)?;
        self.get_spec(uri, &spec).await
    }

    /// Like [`HkpClient::get`] for an already classified specifier.
    ///
    /// Only key ids and 20 byte fingerprints can be fetched. The stream is
    /// returned unread.
    pub async fn get_spec(&self, uri: &KeyserverUri, spec: &KeySpec) -> Result<KeyStream> {
        let hex = get_term(spec)?;
        let part = self.host_part(uri).await?;
        let url = format!("{}/pks/lookup?op=get&options=mr&search=0x{}", part.base, hex);
        debug!("fetching 0x{} from '{}'", hex, part.host);

        self.driver.send(Method::GET, &url, &part.host, None).await
    }

    /// Uploads binary key material.
    ///
    /// The data is ASCII armored and sent as the `keytext` form field.
    pub async fn put(&self, uri: &KeyserverUri, data: &[u8]) -> Result<()> {
        let armored = armor(data);
        let post = PostData::form("keytext", &escape(&armored));
        let part = self.host_part(uri).await?;
        let url = format!("{}/pks/add", part.base);
        debug!("uploading {} bytes to '{}'", post.content_length(), part.host);

        let _response = self
            .driver
            .send(Method::POST, &url, &part.host, Some(&post))
            .await?;
        Ok(())
    }

    /// Stops selecting `host`, directly or as a pool member.
    pub async fn report_dead(&self, host: &str) -> bool {
        self.selector.report_dead(host).await
    }
}

/// Help text of the HKP handler.
///
/// Without a URI the list of handled schemes is returned; for a URI of
/// another scheme there is no help.
pub fn help(uri: Option<&KeyserverUri>) -> Option<&'static str> {
    match uri {
        None => Some(HELP_SCHEMES),
        Some(uri) if uri.scheme == Scheme::Hkp => Some(HELP_TEXT),
        Some(_) => None,
    }
}

/// Text sent as the `search` parameter of an index request, before escaping.
pub fn search_term(spec: &KeySpec) -> Result<String> {
    match spec {
        KeySpec::Exact(text)
        | KeySpec::Substring(text)
        | KeySpec::Mail(text)
        | KeySpec::MailSubstring(text) => Ok(text.clone()),
        KeySpec::ShortKeyId(kid) => Ok(format!("0x{:08X}", kid)),
        KeySpec::LongKeyId(kid) => Ok(format!("0x{:016X}", kid)),
        KeySpec::Fingerprint16(fpr) => Ok(format!("0x{}", to_upper_hex(fpr))),
        KeySpec::Fingerprint20(fpr) => Ok(format!("0x{}", to_upper_hex(fpr))),
        KeySpec::MailEnd(_) | KeySpec::Words(_) | KeySpec::Subject(_) | KeySpec::Keygrip(_) => {
            Err(HkpError::InvalidSpecifier(spec.to_string()))
        }
    }
}

/// Hex digits of a get request, without the `0x` the query adds.
pub fn get_term(spec: &KeySpec) -> Result<String> {
    match spec {
        KeySpec::ShortKeyId(kid) => Ok(format!("{:08X}", kid)),
        KeySpec::LongKeyId(kid) => Ok(format!("{:016X}", kid)),
        KeySpec::Fingerprint20(fpr) => Ok(to_upper_hex(fpr)),
        KeySpec::Fingerprint16(_) => {
            error!("HKP keyservers do not support v3 fingerprints");
            Err(HkpError::UnsupportedFingerprintLength)
        }
        other => Err(HkpError::InvalidSpecifier(other.to_string())),
    }
}

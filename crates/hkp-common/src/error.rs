use thiserror::Error;

#[derive(Error, Debug)]
pub enum HkpError {
    #[error("Invalid key specifier: {0}")]
    InvalidSpecifier(String),

    #[error("HKP keyservers do not support v3 fingerprints")]
    UnsupportedFingerprintLength,

    #[error("No alive host found for '{0}'")]
    NoHost(String),

    #[error("Error connecting to '{target}': {message}")]
    Connect { target: String, message: String },

    #[error("Error reading HTTP response for '{target}': {message}")]
    Response { target: String, message: String },

    #[error("Too many redirections while accessing '{url}'")]
    TooManyRedirects { url: String },

    #[error("Redirect from '{url}' (status {status}) has no location")]
    MissingLocation { url: String, status: u16 },

    #[error("Error accessing '{url}': http status {status}")]
    NoData { url: String, status: u16 },

    #[error("Unsupported encoding: response looks like an HTML document")]
    UnsupportedEncoding,

    #[error("Unexpected end of response")]
    Eof,

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid keyserver URI: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HkpError {
    /// Returns true for errors raised by the redirect follower.
    ///
    /// Both an exhausted budget and a redirect without a usable location are
    /// reported to the caller as "no data" in the wire sense.
    pub fn is_redirect_failure(&self) -> bool {
        matches!(
            self,
            HkpError::TooManyRedirects { .. } | HkpError::MissingLocation { .. }
        )
    }

    /// Returns true if the error means the selected host did not answer.
    ///
    /// Callers use this to decide whether the host should be reported dead.
    pub fn is_host_failure(&self) -> bool {
        matches!(self, HkpError::Connect { .. } | HkpError::Response { .. })
    }
}

impl From<std::collections::TryReserveError> for HkpError {
    fn from(_: std::collections::TryReserveError) -> Self {
        HkpError::OutOfMemory
    }
}

impl From<url::ParseError> for HkpError {
    fn from(err: url::ParseError) -> Self {
        HkpError::InvalidUri(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HkpError>;

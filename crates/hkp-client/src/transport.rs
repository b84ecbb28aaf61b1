//! HTTP transport used by the request driver.
//!
//! The driver only needs one operation from the transport: send a fully
//! built request and hand back the response head with a streaming body.
//! Connection setup, TLS and header parsing live behind [`HttpTransport`].

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::stream::ResponseBody;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Body type of outgoing requests.
pub type RequestBody = Full<Bytes>;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be sent (DNS, TCP, TLS, write).
    #[error("{0}")]
    Connect(String),

    /// The request was sent but no valid response head arrived.
    #[error("{0}")]
    Response(String),
}

/// Sends one HTTP request and returns the response.
pub trait HttpTransport: Send + Sync {
    fn execute(
        &self,
        request: Request<RequestBody>,
    ) -> impl Future<Output = Result<Response<ResponseBody>, TransportError>> + Send;
}

/// Default timeout for a single exchange (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport over hyper's pooled client, speaking HTTP/1.1 with or without TLS.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, RequestBody>,
    timeout: Duration,
}

impl HyperTransport {
    /// Creates a transport that gives up on a response after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        // Install default crypto provider for rustls (ring backend)
        let _ = rustls::crypto::ring::default_provider().install_default();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpTransport for HyperTransport {
    async fn execute(
        &self,
        request: Request<RequestBody>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| {
                TransportError::Response(format!(
                    "no response within {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::Connect(error_chain(&e))
                } else {
                    TransportError::Response(error_chain(&e))
                }
            })?;

        Ok(response.map(|body| body.map_err(|e| Box::new(e) as BoxError).boxed_unsync()))
    }
}

/// Joins an error with its sources, hyper's top level messages being terse.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

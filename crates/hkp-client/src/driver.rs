//! One HTTP exchange with bounded redirect following.

use std::time::Duration;

use bytes::Bytes;
use hkp_common::error::{HkpError, Result};
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, PRAGMA};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use tracing::{debug, error, info};
use url::Url;

use crate::stream::{KeyStream, ResponseBody};
use crate::transport::{HttpTransport, TransportError, DEFAULT_TIMEOUT};

/// Content type of HTML form uploads.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Request driver configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Number of 301/302 hops followed before giving up.
    ///
    /// Default: 2
    pub max_redirects: usize,
    /// Time allowed for a single exchange to produce a response head.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_redirects: 2,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Body of a POST request.
#[derive(Debug, Clone)]
pub struct PostData {
    content_type: String,
    payload: Bytes,
}

impl PostData {
    pub fn new(content_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            payload: payload.into(),
        }
    }

    /// Form upload of a single field; `escaped` must already be URL escaped.
    pub fn form(field: &str, escaped: &str) -> Self {
        let mut payload = String::with_capacity(field.len() + 1 + escaped.len());
        payload.push_str(field);
        payload.push('=');
        payload.push_str(escaped);
        Self::new(FORM_URLENCODED, payload)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn content_length(&self) -> usize {
        self.payload.len()
    }
}

/// Where an exchange currently stands.
enum State {
    /// About to send a request to the contained URL.
    Connecting(String),
    /// The response head for the contained URL has arrived.
    AwaitingResponse(String, Response<ResponseBody>),
    /// The server sent us elsewhere.
    Redirecting(String),
}

/// Issues requests against fully formed URLs.
///
/// Redirects are followed in a loop, never recursively. The response of a
/// superseded attempt is dropped before the next attempt starts, which
/// hands its connection back to the transport.
pub struct RequestDriver<T> {
    transport: T,
    config: ClientConfig,
}

impl<T: HttpTransport> RequestDriver<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `method` to `url` and returns the body of the final response.
    ///
    /// `target` names the keyserver in diagnostics. With `post` given, its
    /// content type, length and payload make up the request body.
    ///
    /// # Errors
    ///
    /// - `Connect` / `Response` when the transport fails, tagged with `target`
    /// - `MissingLocation` for a redirect without a usable `Location`
    /// - `TooManyRedirects` once the redirect budget is spent
    /// - `NoData` for any other non-200 status
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        target: &str,
        post: Option<&PostData>,
    ) -> Result<KeyStream> {
        let mut redirects_left = self.config.max_redirects;
        let mut state = State::Connecting(url.to_string());

        loop {
            state = match state {
                State::Connecting(current) => {
                    debug!("{} {}", method, current);
                    let request = build_request(&method, &current, post)?;
                    match self.transport.execute(request).await {
                        Ok(response) => State::AwaitingResponse(current, response),
                        Err(TransportError::Connect(message)) => {
                            error!("error connecting to '{}': {}", target, message);
                            return Err(HkpError::Connect {
                                target: target.to_string(),
                                message,
                            });
                        }
                        Err(TransportError::Response(message)) => {
                            error!("error reading HTTP response for '{}': {}", target, message);
                            return Err(HkpError::Response {
                                target: target.to_string(),
                                message,
                            });
                        }
                    }
                }

                State::AwaitingResponse(current, response) => match response.status() {
                    StatusCode::OK => {
                        return Ok(KeyStream::new(response.into_body(), current));
                    }
                    status @ (StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) => {
                        // copy out before the response goes away
                        let location = response
                            .headers()
                            .get(LOCATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(str::to_owned);
                        drop(response);

                        let Some(location) = location else {
                            error!("redirect from '{}' without a location", current);
                            return Err(HkpError::MissingLocation {
                                url: current,
                                status: status.as_u16(),
                            });
                        };
                        if redirects_left == 0 {
                            error!("too many redirections");
                            return Err(HkpError::TooManyRedirects { url: current });
                        }
                        redirects_left -= 1;

                        let next = resolve_location(&current, &location)?;
                        info!(
                            "URL '{}' redirected to '{}' ({})",
                            current,
                            next,
                            status.as_u16()
                        );
                        State::Redirecting(next)
                    }
                    status => {
                        error!("error accessing '{}': http status {}", current, status.as_u16());
                        return Err(HkpError::NoData {
                            url: current,
                            status: status.as_u16(),
                        });
                    }
                },

                State::Redirecting(next) => State::Connecting(next),
            };
        }
    }
}

fn build_request(method: &Method, url: &str, post: Option<&PostData>) -> Result<Request<Full<Bytes>>> {
    let mut builder = Request::builder()
        .method(method.clone())
        .uri(url)
        .header(PRAGMA, "no-cache")
        .header(CACHE_CONTROL, "no-cache");

    let body = match post {
        Some(data) => {
            builder = builder
                .header(CONTENT_TYPE, data.content_type())
                .header(CONTENT_LENGTH, data.content_length());
            Full::new(data.payload().clone())
        }
        None => Full::new(Bytes::new()),
    };

    builder
        .body(body)
        .map_err(|e| HkpError::InvalidUri(format!("{}: {}", url, e)))
}

/// Resolves a `Location` value, which may be relative, against `base`.
fn resolve_location(base: &str, location: &str) -> Result<String> {
    let base = Url::parse(base)?;
    Ok(base.join(location)?.to_string())
}

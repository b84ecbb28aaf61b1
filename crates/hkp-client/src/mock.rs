//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::BodyExt;

use crate::stream::{full_body, ResponseBody};
use crate::transport::{HttpTransport, RequestBody, TransportError};

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Answers requests from a queue of canned responses.
///
/// Once the queue is empty every request fails with a connect error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response<ResponseBody>, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &'static str) -> Self {
        self.push(Ok(response(status, &[], body)))
    }

    pub fn redirect(self, status: u16, location: &str) -> Self {
        self.push(Ok(response(status, &[("Location", location)], "")))
    }

    pub fn fail(self, err: TransportError) -> Self {
        self.push(Err(err))
    }

    fn push(self, item: Result<Response<ResponseBody>, TransportError>) -> Self {
        self.responses.lock().unwrap().push_back(item);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(StatusCode::from_u16(status).unwrap());
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(full_body(body)).unwrap()
}

impl HttpTransport for MockTransport {
    async fn execute(
        &self,
        request: Request<RequestBody>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        let (parts, body) = request.into_parts();
        let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted response".into())))
    }
}

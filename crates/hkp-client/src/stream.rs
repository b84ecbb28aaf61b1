//! Streaming access to response bodies.

use std::convert::Infallible;

use bytes::{Bytes, BytesMut};
use hkp_common::error::{HkpError, Result};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::transport::BoxError;

/// Body type of responses handed back by a transport.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Wraps a complete in-memory payload as a [`ResponseBody`].
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync()
}

/// Readable stream over a keyserver response.
///
/// Data is pulled from the connection chunk by chunk; nothing is buffered
/// beyond what was explicitly peeked or pushed back. Dropping the stream
/// releases the underlying connection.
pub struct KeyStream {
    body: ResponseBody,
    pushed_back: Option<Bytes>,
    source: String,
}

impl KeyStream {
    /// Creates a stream over `body`; `source` names the URL for diagnostics.
    pub fn new(body: ResponseBody, source: impl Into<String>) -> Self {
        Self {
            body,
            pushed_back: None,
            source: source.into(),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(full_body(data), "memory")
    }

    /// URL the data is read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the next non-empty chunk, or `None` at the end of the body.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if let Some(data) = self.pushed_back.take() {
            return Ok(Some(data));
        }
        loop {
            match self.body.frame().await {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(HkpError::Response {
                        target: self.source.clone(),
                        message: e.to_string(),
                    })
                }
                Some(Ok(frame)) => {
                    // trailers carry nothing for us
                    if let Ok(data) = frame.into_data() {
                        if !data.is_empty() {
                            return Ok(Some(data));
                        }
                    }
                }
            }
        }
    }

    /// Returns the first unread byte without consuming it.
    pub async fn peek_byte(&mut self) -> Result<Option<u8>> {
        match self.chunk().await? {
            Some(data) => {
                let first = data[0];
                self.push_back(data);
                Ok(Some(first))
            }
            None => Ok(None),
        }
    }

    /// Puts `data` in front of the unread part of the stream.
    pub fn push_back(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.pushed_back = Some(match self.pushed_back.take() {
            None => data,
            Some(rest) => {
                let mut joined = BytesMut::with_capacity(data.len() + rest.len());
                joined.extend_from_slice(&data);
                joined.extend_from_slice(&rest);
                joined.freeze()
            }
        });
    }

    /// Reads everything that is left.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(data) = self.chunk().await? {
            out.extend_from_slice(&data);
        }
        Ok(out.freeze())
    }

    /// Copies the rest of the stream into `writer`, returning the byte count.
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut total = 0u64;
        while let Some(data) = self.chunk().await? {
            writer.write_all(&data).await?;
            total += data.len() as u64;
        }
        writer.flush().await?;
        Ok(total)
    }
}

impl std::fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStream")
            .field("source", &self.source)
            .field("pushed_back", &self.pushed_back.as_ref().map(Bytes::len))
            .finish()
    }
}

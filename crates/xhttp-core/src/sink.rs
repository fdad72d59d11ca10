//! Response sinks.
//!
//! A [`ResponseSink`] is the per-request object a handler writes its
//! status, headers and body to. The status line is write-once: the first
//! [`ResponseSink::write_header`] call (or the first body write, which
//! implies `200 OK`) commits it.
//!
//! [`ResponseBuffer`] is an in-memory sink: the natural recorder for handler
//! tests, and a way to run a handler outside the server and turn the result
//! into an [`http::Response`]. The server itself uses a streaming sink that
//! sends the response head on the first flush.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use xhttp_core::{ResponseBuffer, ResponseSink};
//!
//! let mut sink = ResponseBuffer::new();
//! sink.write_header(StatusCode::CREATED);
//! sink.write(b"done").unwrap();
//!
//! assert_eq!(sink.status(), Some(StatusCode::CREATED));
//! assert_eq!(sink.body(), b"done");
//! ```

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;
use thiserror::Error;

/// Errors reported by a sink when bytes cannot be accepted.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The connection was handed off through a protocol upgrade.
    #[error("connection has been upgraded; response body can no longer be written")]
    Upgraded,

    /// The body exceeded the configured limit.
    #[error("response body exceeds limit of {limit} bytes")]
    BodyTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The response sink contract.
///
/// Implementations must be `Send` so handlers holding `&mut dyn ResponseSink`
/// across `.await` points produce `Send` futures.
pub trait ResponseSink: Send {
    /// Returns the response headers. Changes made after the status has been
    /// committed are not guaranteed to reach the client.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the status line. Only the first call has an effect.
    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, committing `200 OK` if no status was written yet.
    fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError>;

    /// Flushes buffered data towards the client, committing `200 OK` if no
    /// status was written yet.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Hands off the pending protocol upgrade of the underlying connection.
    ///
    /// Returns `None` when the connection cannot be upgraded or the upgrade
    /// was already taken.
    fn upgrade(&mut self) -> Option<OnUpgrade> {
        None
    }

    /// Returns the committed status, if any.
    fn status(&self) -> Option<StatusCode>;
}

/// In-memory [`ResponseSink`] that can be turned into an HTTP response.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    flushed: bool,
    body_limit: Option<usize>,
}

impl ResponseBuffer {
    /// Creates an empty buffer with no body limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the number of body bytes the buffer accepts.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    /// Returns the headers written so far.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` once [`ResponseSink::flush`] has been called.
    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Returns the status the response will be sent with.
    ///
    /// Mirrors the transport default of `200 OK` when nothing was committed.
    #[must_use]
    pub fn effective_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Converts the buffer into an HTTP response.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.effective_status();
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }

    fn commit(&mut self, status: StatusCode) {
        if let Some(existing) = self.status {
            tracing::warn!(
                existing = existing.as_u16(),
                ignored = status.as_u16(),
                "superfluous status write"
            );
            return;
        }
        self.status = Some(status);
    }
}

impl ResponseSink for ResponseBuffer {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.commit(status);
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        if let Some(limit) = self.body_limit {
            if self.body.len() + buf.len() > limit {
                return Err(SinkError::BodyTooLarge { limit });
            }
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.flushed = true;
        Ok(())
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::HeaderValue;

    #[test]
    fn test_first_status_wins() {
        let mut sink = ResponseBuffer::new();
        sink.write_header(StatusCode::NOT_FOUND);
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_write_commits_ok() {
        let mut sink = ResponseBuffer::new();
        assert_eq!(sink.status(), None);
        sink.write(b"hello").unwrap();
        assert_eq!(sink.status(), Some(StatusCode::OK));

        sink.write_header(StatusCode::BAD_REQUEST);
        assert_eq!(sink.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_flush_commits_ok() {
        let mut sink = ResponseBuffer::new();
        sink.flush().unwrap();
        assert!(sink.is_flushed());
        assert_eq!(sink.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_effective_status_defaults_to_ok() {
        let sink = ResponseBuffer::new();
        assert_eq!(sink.effective_status(), StatusCode::OK);
    }

    #[test]
    fn test_body_limit() {
        let mut sink = ResponseBuffer::new().with_body_limit(4);
        assert_eq!(sink.write(b"abcd").unwrap(), 4);

        let err = sink.write(b"e").unwrap_err();
        assert!(matches!(err, SinkError::BodyTooLarge { limit: 4 }));
        assert_eq!(sink.body(), b"abcd");
    }

    #[test]
    fn test_upgrade_absent_by_default() {
        let mut sink = ResponseBuffer::new();
        assert!(sink.upgrade().is_none());
        // No upgrade was handed out, so writes keep working.
        assert!(sink.write(b"x").is_ok());
    }

    #[test]
    fn test_into_response() {
        let mut sink = ResponseBuffer::new();
        sink.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        sink.write_header(StatusCode::ACCEPTED);
        sink.write(b"queued").unwrap();

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }
}

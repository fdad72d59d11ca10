//! Status-recording sink facade.

use http::{HeaderMap, StatusCode};
use hyper::upgrade::OnUpgrade;
use xhttp_core::{ResponseSink, SinkError};

/// Wraps a [`ResponseSink`] and remembers the first status committed
/// through it.
///
/// Every other capability (headers, body writes, flush, upgrade) is
/// forwarded to the wrapped sink unchanged.
pub struct StatusRecorder<'a> {
    inner: &'a mut dyn ResponseSink,
    recorded: Option<StatusCode>,
}

impl<'a> StatusRecorder<'a> {
    /// Wraps `inner`.
    pub fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self {
            inner,
            recorded: None,
        }
    }

    /// Returns the recorded status, `200 OK` if none was committed.
    #[must_use]
    pub fn recorded_status(&self) -> StatusCode {
        self.status().unwrap_or(StatusCode::OK)
    }

    fn record(&mut self, status: StatusCode) {
        if self.recorded.is_none() {
            self.recorded = Some(status);
        }
    }
}

impl ResponseSink for StatusRecorder<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.record(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        self.record(StatusCode::OK);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.record(StatusCode::OK);
        self.inner.flush()
    }

    fn upgrade(&mut self) -> Option<OnUpgrade> {
        self.inner.upgrade()
    }

    fn status(&self) -> Option<StatusCode> {
        self.recorded.or_else(|| self.inner.status())
    }
}

impl std::fmt::Debug for StatusRecorder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRecorder")
            .field("recorded", &self.recorded)
            .finish_non_exhaustive()
    }
}

//! The response sink the server hands to handlers.
//!
//! Until the handler flushes, status, headers and body are buffered and sent
//! as one sized response when the handler returns. The first flush sends the
//! head right away and switches to a chunked body: everything written from
//! then on goes to the client as it is written.

use std::convert::Infallible;
use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::stream;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::upgrade::OnUpgrade;
use tokio::sync::{mpsc, oneshot};

use xhttp_core::{ResponseSink, SinkError};

/// Body of every response the server sends.
pub(crate) type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Receives the response head once the handler flushes or returns.
pub(crate) type PendingResponse = oneshot::Receiver<Response<ResponseBody>>;

pub(crate) struct StreamingSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    pending: BytesMut,
    written: usize,
    body_limit: usize,
    head: Option<oneshot::Sender<Response<ResponseBody>>>,
    chunks: Option<mpsc::UnboundedSender<Bytes>>,
    upgrade: Option<OnUpgrade>,
    upgraded: bool,
}

impl StreamingSink {
    pub(crate) fn new(body_limit: usize, upgrade: Option<OnUpgrade>) -> (Self, PendingResponse) {
        let (head, pending) = oneshot::channel();
        let sink = Self {
            status: None,
            headers: HeaderMap::new(),
            pending: BytesMut::new(),
            written: 0,
            body_limit,
            head: Some(head),
            chunks: None,
            upgrade,
            upgraded: false,
        };
        (sink, pending)
    }

    /// Completes the response.
    ///
    /// Dropping the sink without finishing leaves an unflushed response
    /// unsent, which the server turns into a bare 500.
    pub(crate) fn finish(mut self) {
        if let Some(head) = self.head.take() {
            let body = Full::new(self.pending.split().freeze()).boxed_unsync();
            // The client may already be gone.
            let _ = head.send(self.response(body));
        }
    }

    fn commit_default(&mut self) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
    }

    fn response(&mut self, body: ResponseBody) -> Response<ResponseBody> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = std::mem::take(&mut self.headers);
        response
    }

    fn start_streaming(&mut self) -> Result<(), SinkError> {
        let Some(head) = self.head.take() else {
            return Ok(());
        };

        let (chunks, receiver) = mpsc::unbounded_channel();
        let body = StreamBody::new(stream::unfold(receiver, |mut receiver| async move {
            let chunk = receiver.recv().await;
            chunk.map(|chunk| (Ok::<_, Infallible>(Frame::data(chunk)), receiver))
        }));

        if !self.pending.is_empty() {
            let _ = chunks.send(self.pending.split().freeze());
        }
        self.chunks = Some(chunks);

        let response = self.response(body.boxed_unsync());
        head.send(response).map_err(|_| client_gone())
    }
}

impl ResponseSink for StreamingSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
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

    fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        if self.upgraded {
            return Err(SinkError::Upgraded);
        }
        self.commit_default();
        if self.written + buf.len() > self.body_limit {
            return Err(SinkError::BodyTooLarge {
                limit: self.body_limit,
            });
        }

        match &self.chunks {
            Some(chunks) => chunks
                .send(Bytes::copy_from_slice(buf))
                .map_err(|_| client_gone())?,
            None => self.pending.extend_from_slice(buf),
        }
        self.written += buf.len();
        Ok(buf.len())
    }

    /// Sends the head and everything written so far.
    ///
    /// After an upgrade this only sends the head, which is how a
    /// `101 Switching Protocols` response reaches the client.
    fn flush(&mut self) -> Result<(), SinkError> {
        self.commit_default();
        self.start_streaming()
    }

    fn upgrade(&mut self) -> Option<OnUpgrade> {
        let upgrade = self.upgrade.take()?;
        self.upgraded = true;
        Some(upgrade)
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

fn client_gone() -> SinkError {
    SinkError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "client is no longer receiving the response",
    ))
}

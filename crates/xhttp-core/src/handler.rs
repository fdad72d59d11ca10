//! The request handler contract.
//!
//! A [`Handler`] handles one request and produces one response by writing to
//! a [`ResponseSink`]. The handler adapter, the logging decorator and plain
//! closures all implement it, so they compose by wrapping.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::RequestContext;
use crate::problem::{InvalidParam, Problem};
use crate::sink::ResponseSink;

/// A boxed future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request with its body already collected.
pub type Request = http::Request<Bytes>;

/// Request extension set when the request body could not be read, for
/// example because it exceeded the server's body limit.
///
/// Such a request reaches the handler with an empty body. The handler
/// adapter answers it with [`BodyReadError::to_problem`]; hand-written
/// handlers should check for it before looking at the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyReadError {
    reason: String,
}

impl BodyReadError {
    /// Creates the extension with the reason the body was rejected.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns why the body could not be read.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The `400 Bad Request` problem naming the `body` parameter.
    #[must_use]
    pub fn to_problem(&self) -> Problem {
        Problem::bad_request([InvalidParam::new("body", self.reason.clone())])
    }
}

impl std::fmt::Display for BodyReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request body could not be read: {}", self.reason)
    }
}

/// Handles one request by writing one response.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use xhttp_core::{handler_fn, Handler};
///
/// let handler = handler_fn(|_ctx, _req, sink| {
///     Box::pin(async move {
///         sink.write_header(StatusCode::NO_CONTENT);
///     })
/// });
/// # let _ = handler;
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Serves a single request.
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        (**self).serve(ctx, request, sink)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        (**self).serve(ctx, request, sink)
    }
}

/// A [`Handler`] backed by a closure. Created by [`handler_fn`].
pub struct HandlerFn<F> {
    func: F,
}

/// Turns a closure into a [`Handler`].
pub fn handler_fn<F>(func: F) -> HandlerFn<F>
where
    F: for<'a> Fn(RequestContext, Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { func }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(RequestContext, Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        (self.func)(ctx, request, sink)
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ResponseBuffer;
    use http::StatusCode;

    #[tokio::test]
    async fn test_handler_fn_writes_to_sink() {
        let handler = handler_fn(|_ctx, req, sink| {
            Box::pin(async move {
                sink.write_header(StatusCode::ACCEPTED);
                let _ = sink.write(req.body());
            })
        });

        let request = http::Request::new(Bytes::from_static(b"ping"));
        let mut sink = ResponseBuffer::new();
        handler
            .serve(RequestContext::new(), request, &mut sink)
            .await;

        assert_eq!(sink.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(sink.body(), b"ping");
    }

    #[test]
    fn test_arc_dyn_handler() {
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(|_ctx, _req, sink| {
            Box::pin(async move {
                sink.write_header(StatusCode::IM_A_TEAPOT);
            })
        }));

        let request = http::Request::new(Bytes::new());
        let mut sink = ResponseBuffer::new();
        tokio_test::block_on(handler.serve(RequestContext::new(), request, &mut sink));

        assert_eq!(sink.status(), Some(StatusCode::IM_A_TEAPOT));
    }

    #[test]
    fn test_body_read_error_problem() {
        let error = BodyReadError::new("length limit exceeded");
        assert_eq!(error.reason(), "length limit exceeded");

        let problem = error.to_problem();
        assert_eq!(problem.status(), StatusCode::BAD_REQUEST);
        match problem {
            Problem::BadRequest(params) => {
                assert_eq!(params, vec![InvalidParam::new("body", "length limit exceeded")]);
            }
            other => panic!("expected bad request, got {other:?}"),
        }
    }
}

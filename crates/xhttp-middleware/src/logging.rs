//! Request logging with panic containment.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use http::StatusCode;
use xhttp_core::{
    BoxFuture, Handler, LogHook, PanicReport, Request, RequestAttributes, RequestContext,
    RequestSummary, ResponseSink, TracingLogHook,
};

use crate::stack::{install_stack_capture, take_panic_stack};
use crate::recorder::StatusRecorder;

/// Decorates a handler with one summary log line per request.
///
/// A panic in the inner handler is contained: the response gets
/// `500 Internal Server Error` unless a status was already committed, the
/// summary carries the panic message and the stack of the panicking frame,
/// and the server keeps running. Creating a decorator chains a
/// stack-recording hook in front of the process panic hook.
pub struct LoggingHandler<H> {
    inner: H,
    hook: Arc<dyn LogHook>,
}

impl<H: Handler> LoggingHandler<H> {
    /// Wraps `inner`, reporting through [`TracingLogHook`].
    pub fn new(inner: H) -> Self {
        install_stack_capture();
        Self {
            inner,
            hook: Arc::new(TracingLogHook),
        }
    }

    /// Replaces the hook summaries are reported to.
    #[must_use]
    pub fn with_log_hook(mut self, hook: Arc<dyn LogHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Returns the wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H> std::fmt::Debug for LoggingHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingHandler").finish_non_exhaustive()
    }
}

impl<H: Handler> Handler for LoggingHandler<H> {
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let started = Instant::now();
            let request_id = ctx.request_id();
            let attributes = RequestAttributes::capture(&request);

            let mut recorder = StatusRecorder::new(sink);
            let outcome = AssertUnwindSafe(self.inner.serve(ctx, request, &mut recorder))
                .catch_unwind()
                .await;

            let (status, panic) = match outcome {
                Ok(()) => (recorder.recorded_status(), None),
                Err(payload) => {
                    let report = PanicReport {
                        message: panic_message(payload.as_ref()),
                        stack: take_panic_stack()
                            .unwrap_or_else(|| Backtrace::force_capture().to_string()),
                    };
                    if recorder.status().is_none() {
                        recorder.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    (StatusCode::INTERNAL_SERVER_ERROR, Some(report))
                }
            };

            self.hook.request_completed(&RequestSummary {
                request_id,
                request: attributes,
                status,
                duration: started.elapsed(),
                panic,
            });
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

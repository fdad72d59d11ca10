//! The handler adapter.
//!
//! [`HttpHandler`] turns a business function returning
//! `Result<Option<T>, HandlerError>` into a [`Handler`]:
//!
//! - `Err(HandlerError::Problem(p))` is written with [`Problem::write_problem`]
//! - `Err(HandlerError::Other(e))` is wrapped in [`Problem::InternalServerError`] first
//! - `Ok(None)` becomes `204 No Content` with an empty body
//! - `Ok(Some(model))` is encoded as `application/json`
//!
//! A request carrying a [`BodyReadError`] is answered with `400 Bad Request`
//! without calling the business function.
//!
//! Write and encode failures are reported to the adapter's [`LogHook`] and
//! never retried.
//!
//! # Example
//!
//! ```rust
//! use xhttp_core::{InvalidParam, Problem, Request, RequestContext};
//! use xhttp_server::{HandlerError, HttpHandler};
//!
//! async fn find_user(
//!     _ctx: RequestContext,
//!     req: Request,
//! ) -> Result<Option<String>, HandlerError> {
//!     match req.uri().query() {
//!         Some("id=1") => Ok(Some("alice".to_string())),
//!         Some(_) => Err(Problem::not_found("user not found").into()),
//!         None => Err(Problem::bad_request([InvalidParam::new("id", "required")]).into()),
//!     }
//! }
//!
//! let handler = HttpHandler::new(find_user);
//! # let _ = handler;
//! ```

use std::future::Future;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;

use xhttp_core::{
    BodyReadError, BoxFuture, Handler, LogHook, Problem, Request, RequestContext, ResponseSink,
    TracingLogHook, WriteError,
};

/// Content type of successful responses.
pub const APPLICATION_JSON: &str = "application/json";

/// The error half of a business function's result.
///
/// Problems are written as they are; anything else becomes a generic
/// internal server error whose cause is only logged.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A failure that renders itself as a problem response.
    #[error(transparent)]
    Problem(#[from] Problem),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Converts the error into the problem that will be written.
    #[must_use]
    pub fn into_problem(self) -> Problem {
        match self {
            Self::Problem(problem) => problem,
            Self::Other(error) => Problem::InternalServerError(error),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.into())
    }
}

/// Adapts a business function into a [`Handler`].
pub struct HttpHandler<F> {
    func: F,
    hook: Arc<dyn LogHook>,
}

impl<F> HttpHandler<F> {
    /// Wraps `func`, reporting failures through [`TracingLogHook`].
    pub fn new<Fut, T>(func: F) -> Self
    where
        F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, HandlerError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Self {
            func,
            hook: Arc::new(TracingLogHook),
        }
    }

    /// Replaces the hook that receives write failures.
    #[must_use]
    pub fn with_log_hook(mut self, hook: Arc<dyn LogHook>) -> Self {
        self.hook = hook;
        self
    }
}

impl<F> std::fmt::Debug for HttpHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandler").finish_non_exhaustive()
    }
}

impl<F, Fut, T> Handler for HttpHandler<F>
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<T>, HandlerError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn serve<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(error) = request.extensions().get::<BodyReadError>() {
                let outcome: Result<Option<()>, HandlerError> = Err(error.to_problem().into());
                write_outcome(&ctx, sink, outcome, self.hook.as_ref());
                return;
            }

            let outcome = (self.func)(ctx.clone(), request).await;
            write_outcome(&ctx, sink, outcome, self.hook.as_ref());
        })
    }
}

/// Writes the outcome of a business function to `sink`.
pub fn write_outcome<T: Serialize>(
    ctx: &RequestContext,
    sink: &mut dyn ResponseSink,
    outcome: Result<Option<T>, HandlerError>,
    hook: &dyn LogHook,
) {
    match outcome {
        Err(error) => {
            let problem = error.into_problem();
            if let Err(write_error) = problem.write_problem(ctx, sink) {
                hook.response_write_failed(ctx, &write_error);
            }
        }
        Ok(None) => sink.write_header(StatusCode::NO_CONTENT),
        Ok(Some(model)) => write_json(ctx, sink, &model, hook),
    }
}

fn write_json<T: Serialize>(
    ctx: &RequestContext,
    sink: &mut dyn ResponseSink,
    model: &T,
    hook: &dyn LogHook,
) {
    // Encode before touching the sink so a failure can still become a 500.
    let mut encoded = match serde_json::to_vec(model) {
        Ok(encoded) => encoded,
        Err(error) => {
            hook.response_write_failed(ctx, &WriteError::Encode(error));
            sink.headers_mut().remove(CONTENT_TYPE);
            sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            return;
        }
    };
    encoded.push(b'\n');

    sink.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    sink.write_header(StatusCode::OK);
    if let Err(error) = sink.write(&encoded) {
        hook.response_write_failed(ctx, &WriteError::Sink(error));
    }
}

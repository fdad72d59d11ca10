//! Log hooks.
//!
//! The handler adapter and the logging decorator report through a
//! [`LogHook`] handed to them at construction. [`TracingLogHook`] is the
//! default and emits `tracing` events; tests install their own hook to
//! observe what was reported without touching global state.

use std::time::Duration;

use http::StatusCode;

use crate::context::RequestContext;
use crate::error::WriteError;

/// Request attributes captured before the inner handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAttributes {
    /// HTTP method.
    pub method: String,
    /// Request URL as received.
    pub url: String,
    /// Host the request was addressed to.
    pub host: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub proto: String,
    /// `User-Agent` header, empty when absent.
    pub user_agent: String,
}

impl RequestAttributes {
    /// Captures the attributes of `request`.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority for absolute-form requests.
    #[must_use]
    pub fn capture<B>(request: &http::Request<B>) -> Self {
        let header = |name: http::header::HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
        };

        let host = header(http::header::HOST)
            .or_else(|| request.uri().authority().map(ToString::to_string))
            .unwrap_or_default();

        Self {
            method: request.method().to_string(),
            url: request.uri().to_string(),
            host,
            proto: format!("{:?}", request.version()),
            user_agent: header(http::header::USER_AGENT).unwrap_or_default(),
        }
    }
}

/// A handler panic caught by the logging decorator.
#[derive(Debug, Clone)]
pub struct PanicReport {
    /// The panic payload rendered as text.
    pub message: String,
    /// Stack trace captured where the panic was contained.
    pub stack: String,
}

/// Summary of one finished request.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    /// Request identifier.
    pub request_id: crate::context::RequestId,
    /// Attributes captured at the start of the request.
    pub request: RequestAttributes,
    /// The recorded response status.
    pub status: StatusCode,
    /// Time from the start of the request to completion.
    pub duration: Duration,
    /// Set when the handler panicked.
    pub panic: Option<PanicReport>,
}

/// Severity of a request summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    /// 1xx-3xx.
    Info,
    /// 4xx.
    Warn,
    /// 5xx or a contained panic.
    Error,
}

impl RequestSummary {
    /// Returns the level the summary should be logged at.
    #[must_use]
    pub fn level(&self) -> SummaryLevel {
        if self.panic.is_some() || self.status.is_server_error() {
            SummaryLevel::Error
        } else if self.status.is_client_error() {
            SummaryLevel::Warn
        } else {
            SummaryLevel::Info
        }
    }
}

/// Receives the reports of the handler adapter and the logging decorator.
pub trait LogHook: Send + Sync + 'static {
    /// A response could not be written or encoded.
    fn response_write_failed(&self, ctx: &RequestContext, error: &WriteError);

    /// A request finished. Called exactly once per request.
    fn request_completed(&self, summary: &RequestSummary);
}

/// The default hook, backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogHook;

impl LogHook for TracingLogHook {
    fn response_write_failed(&self, ctx: &RequestContext, error: &WriteError) {
        tracing::error!(
            request_id = %ctx.request_id(),
            error = %error,
            "response could not be written"
        );
    }

    fn request_completed(&self, summary: &RequestSummary) {
        let request = &summary.request;
        let duration_ms = summary.duration.as_secs_f64() * 1000.0;

        if let Some(panic) = &summary.panic {
            tracing::error!(
                request_id = %summary.request_id,
                request.method = %request.method,
                request.url = %request.url,
                request.host = %request.host,
                request.proto = %request.proto,
                request.user_agent = %request.user_agent,
                response.status_code = summary.status.as_u16(),
                response.duration_ms = duration_ms,
                panic.message = %panic.message,
                panic.stack = %panic.stack,
                "server recovered from panic"
            );
            return;
        }

        macro_rules! summary_event {
            ($level:ident, $message:literal) => {
                tracing::$level!(
                    request_id = %summary.request_id,
                    request.method = %request.method,
                    request.url = %request.url,
                    request.host = %request.host,
                    request.proto = %request.proto,
                    request.user_agent = %request.user_agent,
                    response.status_code = summary.status.as_u16(),
                    response.duration_ms = duration_ms,
                    $message
                )
            };
        }

        match summary.level() {
            SummaryLevel::Error => summary_event!(error, "request resulted with server error"),
            SummaryLevel::Warn => summary_event!(warn, "request resulted with client error"),
            SummaryLevel::Info => summary_event!(info, "request finished successfully"),
        }
    }
}

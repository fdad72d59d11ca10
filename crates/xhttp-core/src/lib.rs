//! # xhttp Core
//!
//! Core types shared by the xhttp crates:
//!
//! - [`Problem`] - the problem error taxonomy and its `application/problem+json` rendering
//! - [`ResponseSink`] / [`ResponseBuffer`] - the per-request response sink
//! - [`Handler`] - the "one request, one response" contract
//! - [`RequestContext`] - per-request context with a UUID v7 [`RequestId`]
//! - [`LogHook`] - where write failures and request summaries are reported

#![doc(html_root_url = "https://docs.rs/xhttp-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod handler;
pub mod hook;
pub mod problem;
pub mod sink;

pub use context::{RequestContext, RequestId};
pub use error::WriteError;
pub use handler::{handler_fn, BodyReadError, BoxFuture, Handler, HandlerFn, Request};
pub use hook::{
    LogHook, PanicReport, RequestAttributes, RequestSummary, SummaryLevel, TracingLogHook,
};
pub use problem::{
    InvalidParam, Problem, ProblemBody, ProblemDetail, ValidationProblemDetail,
    APPLICATION_PROBLEM_JSON,
};
pub use sink::{ResponseBuffer, ResponseSink, SinkError};

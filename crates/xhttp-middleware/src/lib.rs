//! # xhttp middleware
//!
//! [`LoggingHandler`] wraps any [`xhttp_core::Handler`] and, per request:
//!
//! - captures the request attributes and start time
//! - records the first status the inner handler commits
//! - contains panics, answering `500 Internal Server Error` and keeping the
//!   stack of the panicking frame
//! - reports exactly one [`xhttp_core::RequestSummary`] to its log hook
//!
//! ## Example
//!
//! ```rust
//! use http::StatusCode;
//! use xhttp_core::handler_fn;
//! use xhttp_middleware::LoggingHandler;
//!
//! let handler = LoggingHandler::new(handler_fn(|_ctx, _req, sink| {
//!     Box::pin(async move {
//!         sink.write_header(StatusCode::NO_CONTENT);
//!     })
//! }));
//! # let _ = handler;
//! ```

#![doc(html_root_url = "https://docs.rs/xhttp-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod logging;
mod recorder;
mod stack;

pub use logging::LoggingHandler;
pub use recorder::StatusRecorder;

//! # xhttp server
//!
//! The HTTP side of xhttp:
//!
//! - [`HttpHandler`] adapts `Result<Option<T>, HandlerError>` business
//!   functions to [`xhttp_core::Handler`]
//! - [`Server`] serves a handler over HTTP/1.1 and shuts down gracefully
//! - [`run_until_signal_or_error`] ties the server to SIGINT/SIGTERM
//!
//! ## Example
//!
//! ```rust,no_run
//! use xhttp_core::{Request, RequestContext};
//! use xhttp_server::{run_until_signal_or_error, HandlerError, HttpHandler, Server, ServerConfig};
//!
//! async fn hello(_ctx: RequestContext, _req: Request) -> Result<Option<&'static str>, HandlerError> {
//!     Ok(Some("hello"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xhttp_server::ServerError> {
//!     let server = Server::new(ServerConfig::default(), HttpHandler::new(hello));
//!     run_until_signal_or_error(server).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/xhttp-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod adapter;
mod config;
mod server;
pub mod shutdown;
mod streaming;

pub use adapter::{write_outcome, HandlerError, HttpHandler, APPLICATION_JSON};
pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use server::{run_until_signal_or_error, BoundServer, Server, ServerError};
pub use shutdown::{ConnectionToken, ConnectionTracker, ServerState, ShutdownSignal};

//! # xhttp
//!
//! A small support layer for HTTP services:
//!
//! - **Problem details** – a closed error taxonomy rendered as
//!   `application/problem+json`
//! - **Handler adapter** – business functions return
//!   `Result<Option<T>, HandlerError>` and never touch the response
//! - **Request logging** – one summary line per request, panics contained
//! - **Graceful shutdown** – SIGINT/SIGTERM drains in-flight requests under a
//!   deadline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xhttp::prelude::*;
//!
//! async fn get_user(_ctx: RequestContext, req: Request) -> Result<Option<String>, HandlerError> {
//!     match req.uri().path() {
//!         "/users/1" => Ok(Some("alice".to_string())),
//!         _ => Err(Problem::not_found("user not found").into()),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xhttp::Error> {
//!     let config = ConfigLoader::new().with_env_prefix("XHTTP").load()?;
//!     xhttp::serve(&config, HttpHandler::new(get_user)).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/xhttp/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error;

// Re-export the member crates
pub use xhttp_config as config;
pub use xhttp_core as core;
pub use xhttp_middleware as middleware;
pub use xhttp_server as server;
pub use xhttp_telemetry as telemetry;

/// Errors returned by [`serve`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] xhttp_config::ConfigError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] xhttp_telemetry::TelemetryError),

    /// The server failed to start, run or drain.
    #[error(transparent)]
    Server(#[from] xhttp_server::ServerError),
}

/// Installs logging, wraps `handler` in a [`middleware::LoggingHandler`] and
/// serves it until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns the first failure of logging setup, binding, accepting or
/// draining.
pub async fn serve(
    config: &xhttp_config::XhttpConfig,
    handler: impl xhttp_core::Handler,
) -> Result<(), Error> {
    xhttp_telemetry::init_logging(&config.logging.to_log_config())?;

    let server = xhttp_server::Server::new(
        config.server.to_server_config(),
        xhttp_middleware::LoggingHandler::new(handler),
    );
    xhttp_server::run_until_signal_or_error(server)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "server stopped with error");
            Error::Server(e)
        })
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use xhttp::prelude::*;
/// ```
pub mod prelude {
    pub use xhttp_core::{
        handler_fn, Handler, InvalidParam, LogHook, Problem, Request, RequestContext, RequestId,
        ResponseBuffer, ResponseSink, TracingLogHook,
    };

    pub use xhttp_server::{
        run_until_signal_or_error, BoundServer, HandlerError, HttpHandler, Server, ServerConfig,
        ServerError, ServerState, ShutdownSignal,
    };

    pub use xhttp_middleware::LoggingHandler;

    pub use xhttp_config::{ConfigLoader, XhttpConfig};

    pub use xhttp_telemetry::{init_logging, LogConfig};
}

//! HTTP server with graceful shutdown.
//!
//! [`Server`] binds a listener, serves every connection with hyper's HTTP/1
//! implementation and hands each request to a single [`Handler`]. Shutdown
//! stops the accept loop, asks every live connection to finish its current
//! request and waits for them under the configured timeout.
//!
//! # Example
//!
//! ```rust,no_run
//! use xhttp_core::handler_fn;
//! use xhttp_server::{run_until_signal_or_error, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xhttp_server::ServerError> {
//!     let handler = handler_fn(|_ctx, _req, sink| {
//!         Box::pin(async move {
//!             let _ = sink.write(b"hello\n");
//!         })
//!     });
//!
//!     let server = Server::new(ServerConfig::default(), handler);
//!     run_until_signal_or_error(server).await
//! }
//! ```

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::{BodyExt, Empty, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use xhttp_core::{BodyReadError, BoxFuture, Handler, RequestContext};

use crate::config::ServerConfig;
use crate::shutdown::{
    wait_for_os_signal, ConnectionToken, ConnectionTracker, ServerState, ShutdownSignal,
};
use crate::streaming::{ResponseBody, StreamingSink};

/// Errors that end a server run.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address could not be parsed.
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound.
    #[error("could not listen on {addr}: {source}")]
    Bind {
        /// The address the server tried to bind.
        addr: SocketAddr,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// The accept loop failed for a reason other than a single bad
    /// connection.
    #[error("could not accept connections: {0}")]
    Accept(#[source] io::Error),

    /// OS signal handlers could not be registered.
    #[error("could not register signal handlers: {0}")]
    Signal(#[source] io::Error),

    /// Connections were still open when the drain deadline expired.
    #[error("graceful shutdown timed out with {remaining} connection(s) still open")]
    ShutdownTimeout {
        /// Connections still open at the deadline.
        remaining: usize,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An unbound server.
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn Handler>,
}

impl Server {
    /// Creates a server that sends every request to `handler`.
    pub fn new(config: ServerConfig, handler: impl Handler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidAddress`] or [`ServerError::Bind`].
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(addr = %local_addr, "server listening");

        let (state, _) = watch::channel(ServerState::Running);
        Ok(BoundServer {
            listener,
            local_addr,
            config: self.config,
            handler: self.handler,
            state,
        })
    }

    /// Binds, serves until SIGINT/SIGTERM and drains.
    ///
    /// # Errors
    ///
    /// See [`BoundServer::run_until_signal_or_error`].
    pub async fn run_until_signal_or_error(self) -> Result<(), ServerError> {
        self.bind().await?.run_until_signal_or_error().await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Runs `server` until a termination signal arrives or the accept loop
/// fails, then drains.
///
/// Returns `Ok(())` only when every connection closed within the shutdown
/// timeout.
///
/// # Errors
///
/// Returns the error of whichever phase failed: binding, accepting, signal
/// registration or draining.
pub async fn run_until_signal_or_error(server: Server) -> Result<(), ServerError> {
    server.run_until_signal_or_error().await
}

/// A server whose listener is bound.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    handler: Arc<dyn Handler>,
    state: watch::Sender<ServerState>,
}

impl BoundServer {
    /// Returns the address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Subscribes to lifecycle changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serves until SIGINT/SIGTERM, then drains.
    ///
    /// An accept failure before any signal is returned right away.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`], [`ServerError::Signal`] or
    /// [`ServerError::ShutdownTimeout`].
    pub async fn run_until_signal_or_error(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::new();
        let run = self.run_with_shutdown(shutdown.clone());
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => result,
            signal = wait_for_os_signal() => {
                let name = signal.map_err(ServerError::Signal)?;
                tracing::info!(signal = name, "received signal, initiating graceful shutdown");
                shutdown.trigger();
                run.await
            }
        }
    }

    /// Serves until `shutdown` is triggered, then drains.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] when the accept loop fails and
    /// [`ServerError::ShutdownTimeout`] when connections outlive the
    /// shutdown timeout.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let Self {
            listener,
            config,
            handler,
            state,
            ..
        } = self;

        serve(listener, config, handler, &state, shutdown).await
    }
}

impl std::fmt::Debug for BoundServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundServer")
            .field("local_addr", &self.local_addr)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Accept errors that concern one connection rather than the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Source of incoming connections.
trait Accept: Send {
    fn accept(&mut self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>>;
}

impl Accept for TcpListener {
    fn accept(&mut self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        Box::pin(TcpListener::accept(self))
    }
}

/// Accepts connections until `shutdown` fires or accepting fails, then
/// drains the connections still open.
async fn serve<A: Accept>(
    mut acceptor: A,
    config: ServerConfig,
    handler: Arc<dyn Handler>,
    state: &watch::Sender<ServerState>,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let config = Arc::new(config);
    let tracker = ConnectionTracker::new();
    let drain = ShutdownSignal::new();

    let accepted = loop {
        tokio::select! {
            biased;

            () = shutdown.recv() => break Ok(()),

            result = acceptor.accept() => match result {
                Ok((stream, remote_addr)) => {
                    tokio::spawn(serve_connection(
                        stream,
                        remote_addr,
                        Arc::clone(&handler),
                        Arc::clone(&config),
                        drain.clone(),
                        tracker.acquire(),
                    ));
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "accept failed for a single connection");
                }
                Err(e) => break Err(ServerError::Accept(e)),
            },
        }
    };

    drop(acceptor);
    drain.trigger();

    if let Err(e) = accepted {
        tracing::error!(error = %e, "accept loop failed");
        state.send_replace(ServerState::Stopped);
        return Err(e);
    }

    state.send_replace(ServerState::Draining);
    let timeout = config.shutdown_timeout();
    tracing::info!(
        active_connections = tracker.active_connections(),
        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        "draining connections"
    );

    let drained = tokio::time::timeout(timeout, tracker.wait_for_shutdown()).await;
    state.send_replace(ServerState::Stopped);

    match drained {
        Ok(()) => {
            tracing::info!("server stopped");
            Ok(())
        }
        Err(_) => {
            let remaining = tracker.active_connections();
            tracing::warn!(remaining, "shutdown timeout reached");
            Err(ServerError::ShutdownTimeout { remaining })
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    handler: Arc<dyn Handler>,
    config: Arc<ServerConfig>,
    drain: ShutdownSignal,
    _token: ConnectionToken,
) {
    let max_body_bytes = config.max_body_bytes();
    let service = service_fn(move |request: http::Request<Incoming>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(dispatch(handler, request, max_body_bytes).await) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .keep_alive(config.keep_alive())
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                }
                break;
            }
            () = drain.recv(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Collects the request body and runs the handler on its own task.
///
/// The response is returned as soon as the handler flushes or finishes, so a
/// flushed response streams while the handler keeps writing. A body that
/// cannot be read reaches the handler as a [`BodyReadError`] extension.
async fn dispatch(
    handler: Arc<dyn Handler>,
    mut request: http::Request<Incoming>,
    max_body_bytes: usize,
) -> Response<ResponseBody> {
    let ctx = RequestContext::from_request(&request);
    let request_id = ctx.request_id();
    let upgrade = request.extensions_mut().remove::<OnUpgrade>();
    let (parts, body) = request.into_parts();

    let request = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => http::Request::from_parts(parts, collected.to_bytes()),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "could not read request body");
            let mut request = http::Request::from_parts(parts, Bytes::new());
            request
                .extensions_mut()
                .insert(BodyReadError::new(e.to_string()));
            request
        }
    };

    let (mut sink, pending) = StreamingSink::new(max_body_bytes, upgrade);
    let task = tokio::spawn(async move {
        handler.serve(ctx, request, &mut sink).await;
        sink.finish();
    });

    match pending.await {
        Ok(response) => response,
        Err(_) => {
            if let Err(e) = task.await {
                tracing::error!(request_id = %request_id, error = %e, "handler failed before responding");
            }
            let mut response = Response::new(Empty::<Bytes>::new().boxed_unsync());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

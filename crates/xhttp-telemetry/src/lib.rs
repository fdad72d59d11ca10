//! # xhttp telemetry
//!
//! Installs the global `tracing` subscriber the rest of xhttp logs through.
//! Request summaries, problem writes and server lifecycle events are plain
//! `tracing` events; this crate decides how they are rendered.
//!
//! ```rust,no_run
//! use xhttp_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production()).expect("logging already initialized");
//! tracing::info!("ready");
//! ```

#![doc(html_root_url = "https://docs.rs/xhttp-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

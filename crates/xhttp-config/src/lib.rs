//! # xhttp config
//!
//! Loads [`XhttpConfig`] in layers, later layers overriding earlier ones:
//!
//! 1. built-in defaults (or the development/production presets)
//! 2. a TOML or JSON file; unknown fields are rejected
//! 3. `PREFIX__SECTION__KEY` environment variables
//!
//! The result converts into the runtime types the other crates take:
//! [`xhttp_server::ServerConfig`] and [`xhttp_telemetry::LogConfig`].
//!
//! ```no_run
//! use xhttp_config::ConfigLoader;
//!
//! # fn main() -> Result<(), xhttp_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("xhttp.toml")?
//!     .with_env_prefix("XHTTP")
//!     .load()?;
//!
//! let server_config = config.server.to_server_config();
//! let log_config = config.logging.to_log_config();
//! # let _ = (server_config, log_config);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/xhttp-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::XhttpConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingSection, ServerSection};

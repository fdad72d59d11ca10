//! Layered configuration loader.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::schema::LogFormat;
use crate::{ConfigError, XhttpConfig};

/// Builds an [`XhttpConfig`] from defaults, a file and the environment.
///
/// Environment variables use the form `PREFIX__SECTION__KEY`, for example
/// `XHTTP__SERVER__HTTP_ADDR=0.0.0.0:9000` or `XHTTP__LOGGING__LEVEL=debug`.
///
/// ```
/// use xhttp_config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"\n", "toml")
///     .unwrap()
///     .load()
///     .unwrap();
///
/// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
/// assert_eq!(config.server.shutdown_timeout_secs, 5);
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: XhttpConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Starts from the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from [`XhttpConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = XhttpConfig::development();
        self
    }

    /// Starts from [`XhttpConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = XhttpConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file, replacing the current layer.
    ///
    /// Sections and fields missing from the file take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, has an unknown extension or
    /// contains invalid or unknown fields.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.with_string(&content, format)
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses `content` as `toml` or `json`, replacing the current layer.
    ///
    /// # Errors
    ///
    /// Fails on an unknown format name or invalid content.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` overrides, applied by [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads `.env` from the working directory or its parents, if present.
    ///
    /// Variables already set in the process environment win.
    ///
    /// # Errors
    ///
    /// Fails if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads variables from the given `.env` file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable or unknown override, or if validation fails.
    pub fn load(mut self) -> Result<XhttpConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or
    /// validation.
    #[must_use]
    pub fn load_unvalidated(self) -> XhttpConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars = Vec::new();
        for (key, value) in env::vars_os() {
            // Keys that are not UTF-8 cannot carry the prefix.
            let Some(key) = key.to_str().filter(|key| key.starts_with(&marker)) else {
                continue;
            };
            let value = value
                .into_string()
                .map_err(|_| ConfigError::env_parse_error(key, "value is not valid UTF-8"))?;
            vars.push((key.to_string(), value));
        }
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key[marker.len()..], &key, &value)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, path: &str, var: &str, value: &str) -> Result<(), ConfigError> {
        let server = &mut self.config.server;
        let logging = &mut self.config.logging;
        let parts: Vec<&str> = path.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                server.shutdown_timeout_secs = parse(var, value, "expected integer")?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                server.max_body_bytes = parse(var, value, "expected integer")?;
            }
            ["SERVER", "KEEP_ALIVE"] => server.keep_alive = parse(var, value, "expected boolean")?,
            ["LOGGING", "ENABLED"] => logging.enabled = parse(var, value, "expected boolean")?,
            ["LOGGING", "LEVEL"] => logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(var, "expected json or pretty")),
                };
            }
            ["LOGGING", "SPAN_EVENTS"] => {
                logging.span_events = parse(var, value, "expected boolean")?;
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                logging.include_location = parse(var, value, "expected boolean")?;
            }
            ["LOGGING", "THREAD_IDS"] => logging.thread_ids = parse(var, value, "expected boolean")?,
            ["LOGGING", "INCLUDE_TARGET"] => {
                logging.include_target = parse(var, value, "expected boolean")?;
            }
            ["LOGGING", "SERVICE_NAME"] => logging.service_name = value.to_string(),
            _ => return Err(ConfigError::env_parse_error(var, "unknown configuration key")),
        }
        Ok(())
    }
}

fn parse<T: FromStr>(var: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(var, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, XhttpConfig::default());
    }

    #[test]
    fn test_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");

        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_json_string() {
        let config = ConfigLoader::new()
            .with_string(r#"{"logging":{"level":"warn","format":"pretty"}}"#, "JSON")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.server, crate::ServerSection::default());
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigLoader::new().with_string("", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref f) if f == "yaml"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("XHTTP_LOADER_ENV__SERVER__HTTP_ADDR", "127.0.0.1:9999");
        env::set_var("XHTTP_LOADER_ENV__SERVER__SHUTDOWN_TIMEOUT_SECS", "9");
        env::set_var("XHTTP_LOADER_ENV__LOGGING__FORMAT", "Pretty");
        env::set_var("XHTTP_LOADER_ENV__LOGGING__THREAD_IDS", "true");

        let config = ConfigLoader::new()
            .with_env_prefix("xhttp_loader_env")
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:9999");
        assert_eq!(config.server.shutdown_timeout_secs, 9);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.thread_ids);
    }

    #[test]
    fn test_env_bad_value() {
        env::set_var("XHTTP_LOADER_BAD__SERVER__KEEP_ALIVE", "sometimes");

        let err = ConfigLoader::new()
            .with_env_prefix("XHTTP_LOADER_BAD")
            .load()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "XHTTP_LOADER_BAD__SERVER__KEEP_ALIVE")
        );
    }

    #[test]
    fn test_env_unknown_key() {
        env::set_var("XHTTP_LOADER_UNKNOWN__SERVER__PORT", "80");

        let err = ConfigLoader::new()
            .with_env_prefix("XHTTP_LOADER_UNKNOWN")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_env_override_is_validated() {
        env::set_var("XHTTP_LOADER_INVALID__SERVER__HTTP_ADDR", "nowhere");

        let err = ConfigLoader::new()
            .with_env_prefix("XHTTP_LOADER_INVALID")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_env_non_utf8_value_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        env::set_var(
            "XHTTP_LOADER_BYTES__LOGGING__LEVEL",
            OsStr::from_bytes(b"de\xffbug"),
        );

        let err = ConfigLoader::new()
            .with_env_prefix("XHTTP_LOADER_BYTES")
            .load()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "XHTTP_LOADER_BYTES__LOGGING__LEVEL")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_env_ignores_unrelated_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        env::set_var("XHTTP_LOADER_STRAY_BYTES", OsStr::from_bytes(b"\xfe\xff"));
        env::set_var(OsStr::from_bytes(b"XHTTP_LOADER_\xfe"), "1");
        env::set_var("XHTTP_LOADER_CLEAN__LOGGING__LEVEL", "warn");

        let config = ConfigLoader::new()
            .with_env_prefix("XHTTP_LOADER_CLEAN")
            .load()
            .unwrap();
        assert_eq!(config.logging.level, "warn");
    }
}

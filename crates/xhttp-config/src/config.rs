//! The root configuration type.

use serde::{Deserialize, Serialize};

use crate::schema::{LogFormat, LoggingSection, ServerSection};
use crate::ConfigError;

/// Complete xhttp configuration.
///
/// ```
/// use xhttp_config::XhttpConfig;
///
/// let config = XhttpConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct XhttpConfig {
    /// Server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl XhttpConfig {
    /// Local development: pretty logs at `debug`, loopback address.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerSection {
                http_addr: "127.0.0.1:8080".to_string(),
                ..ServerSection::default()
            },
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                span_events: true,
                include_location: true,
                ..LoggingSection::default()
            },
        }
    }

    /// Production: JSON logs at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(XhttpConfig::default().validate().is_ok());
        assert!(XhttpConfig::development().validate().is_ok());
        assert!(XhttpConfig::production().validate().is_ok());
        assert_eq!(XhttpConfig::development().logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_address() {
        let mut config = XhttpConfig::default();
        config.server.http_addr = "localhost".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server.http_addr"));
    }

    #[test]
    fn test_zero_body_cap() {
        let mut config = XhttpConfig::default();
        config.server.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<XhttpConfig, _> = toml::from_str("[metrics]\nenabled = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<XhttpConfig, _> = serde_json::from_str(r#"{"server":{"port":80}}"#);
        assert!(result.is_err());
    }
}

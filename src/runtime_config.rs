//! # Runtime Configuration Module
//!
//! Router-wide settings shared by every request pipeline.
//!
//! ## Sources
//!
//! [`RouterConfig`] can be built in code, read from YAML, or loaded from the
//! environment:
//!
//! ```yaml
//! environment: development
//! mount_path: /api/
//! handler_timeout_ms: 2000
//! slow_response_ms: 5000
//! ```
//!
//! | Variable                         | Field                     | Default      |
//! |----------------------------------|---------------------------|--------------|
//! | `SCHEMAROUTE_ENV`                | `environment`             | `production` |
//! | `SCHEMAROUTE_MOUNT_PATH`         | `mount_path`              | empty        |
//! | `SCHEMAROUTE_HANDLER_TIMEOUT_MS` | `handler_timeout`         | none         |
//! | `SCHEMAROUTE_SLOW_RESPONSE_MS`   | `slow_response_threshold` | `5000`       |
//!
//! ## Diagnostics
//!
//! Error payloads (`devInfo`) reach the caller only in
//! [`Environment::Development`]. They are logged in every environment.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default threshold above which a response is logged as slow.
pub const DEFAULT_SLOW_RESPONSE: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "dev")]
    Development,
    #[default]
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    /// Parse a name as accepted in configuration files.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config document")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub environment: Environment,
    /// Prefix for every bound path; a trailing slash is stripped by the router
    pub mount_path: String,
    /// Race the handler against this timeout; `None` or zero waits indefinitely
    #[serde(rename = "handler_timeout_ms", with = "optional_millis")]
    pub handler_timeout: Option<Duration>,
    #[serde(rename = "slow_response_ms", with = "millis")]
    pub slow_response_threshold: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            mount_path: String::new(),
            handler_timeout: None,
            slow_response_threshold: DEFAULT_SLOW_RESPONSE,
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_slow_response_threshold(mut self, threshold: Duration) -> Self {
        self.slow_response_threshold = threshold;
        self
    }

    /// Whether error diagnostics are serialized to callers.
    #[must_use]
    pub fn diagnostics_enabled(&self) -> bool {
        self.environment == Environment::Development
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed documents.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Yaml`] when it does not parse.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Load from `SCHEMAROUTE_*` variables; unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for unparseable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(value) = env::var("SCHEMAROUTE_ENV") {
            config.environment = Environment::parse(&value).ok_or(ConfigError::InvalidEnv {
                var: "SCHEMAROUTE_ENV",
                value,
            })?;
        }
        if let Ok(value) = env::var("SCHEMAROUTE_MOUNT_PATH") {
            config.mount_path = value;
        }
        if let Some(ms) = env_millis("SCHEMAROUTE_HANDLER_TIMEOUT_MS")? {
            config.handler_timeout = Some(ms).filter(|d| !d.is_zero());
        }
        if let Some(ms) = env_millis("SCHEMAROUTE_SLOW_RESPONSE_MS")? {
            config.slow_response_threshold = ms;
        }
        Ok(config)
    }
}

fn env_millis(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

fn duration_millis(d: &Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(duration_millis(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod optional_millis {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&duration_millis(d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d)
            .map(|ms| ms.filter(|&ms| ms > 0).map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_without_timeout() {
        let config = RouterConfig::default();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.diagnostics_enabled());
        assert_eq!(config.handler_timeout, None);
        assert_eq!(config.slow_response_threshold, Duration::from_millis(5000));
    }

    #[test]
    fn yaml_uses_milliseconds() {
        let config = RouterConfig::from_yaml_str(
            "environment: dev\nmount_path: /api/\nhandler_timeout_ms: 250\n",
        )
        .unwrap();
        assert!(config.diagnostics_enabled());
        assert_eq!(config.mount_path, "/api/");
        assert_eq!(config.handler_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.slow_response_threshold, DEFAULT_SLOW_RESPONSE);
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let config = RouterConfig::from_yaml_str("handler_timeout_ms: 0\n").unwrap();
        assert_eq!(config.handler_timeout, None);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        assert!(RouterConfig::from_yaml_str("environment: staging\n").is_err());
        assert_eq!(Environment::parse("PROD"), Some(Environment::Production));
        assert_eq!(Environment::parse("staging"), None);
    }
}

//! API configuration.
//!
//! [`ApiConfig`] carries the API identity (name and version, both part of
//! every request fingerprint) and the access token protected routes are
//! checked against. Build it in code with the chained setters, or read it
//! from the Lambda environment with [`ApiConfig::from_env`].

use std::env;

use thiserror::Error;

/// Environment variable holding the API name.
pub const ENV_NAME: &str = "API_NAME";
/// Environment variable holding the API version.
pub const ENV_VERSION: &str = "API_VERSION";
/// Environment variable holding the access token of protected routes.
pub const ENV_TOKEN: &str = "TOKEN";
/// Environment variable enabling debug mode (`1`/`true`/`yes`/`on`).
pub const ENV_DEBUG: &str = "API_DEBUG";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Identity and access settings of an API.
///
/// # Examples
///
/// ```
/// use rttp_cache::config::ApiConfig;
///
/// let config = ApiConfig::new("tiles").version("2.1.0").access_token("s3cret");
/// assert_eq!(config.name(), "tiles");
/// assert_eq!(config.version_str(), "2.1.0");
/// assert_eq!(config.token(), Some("s3cret"));
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    name: String,
    version: String,
    access_token: Option<String>,
    debug: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new("app")
    }
}

impl ApiConfig {
    /// Create a config for the API `name`, version `0.0.1`, no access token.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.0.1".to_owned(),
            access_token: None,
            debug: false,
        }
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Token protected routes must present.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Log every inbound event at `debug` level.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Load from `API_NAME`, `API_VERSION`, `TOKEN` and `API_DEBUG`.
    ///
    /// Unset variables keep the defaults of [`ApiConfig::new`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Empty`]: `API_NAME`, `API_VERSION` or `TOKEN` is set but empty.
    /// - [`ConfigError::InvalidValue`]: `API_DEBUG` is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Testable core of `from_env`.
    pub(crate) fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ApiConfig::default();

        if let Some(name) = non_empty(ENV_NAME, lookup(ENV_NAME))? {
            config.name = name;
        }
        if let Some(version) = non_empty(ENV_VERSION, lookup(ENV_VERSION))? {
            config.version = version;
        }
        config.access_token = non_empty(ENV_TOKEN, lookup(ENV_TOKEN))?;
        if let Some(raw) = lookup(ENV_DEBUG) {
            config.debug = parse_bool(ENV_DEBUG, &raw)?;
        }

        Ok(config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_str(&self) -> &str {
        &self.version
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

fn non_empty(key: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { key }),
        other => Ok(other),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, (*v).to_owned())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.name(), "app");
        assert_eq!(config.version_str(), "0.0.1");
        assert_eq!(config.token(), None);
        assert!(!config.is_debug());
    }

    #[test]
    fn reads_all_variables() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_NAME, "tiles"),
            (ENV_VERSION, "3.0.0"),
            (ENV_TOKEN, "abc"),
            (ENV_DEBUG, "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.name(), "tiles");
        assert_eq!(config.version_str(), "3.0.0");
        assert_eq!(config.token(), Some("abc"));
        assert!(config.is_debug());
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_TOKEN, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { key: ENV_TOKEN }));
    }

    #[test]
    fn bad_debug_flag_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_DEBUG, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_DEBUG, .. }));
    }
}

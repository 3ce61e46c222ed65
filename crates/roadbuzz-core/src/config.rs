//! Client configuration.
//!
//! Loaded from a TOML file or constructed in code. Only the two base URLs
//! are required; everything else has a named default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recency::DEFAULT_RECENCY_WINDOW;
use crate::store::DEFAULT_MAX_ITEMS;

/// Default delay between push-channel reconnect attempts.
///
/// Fixed rather than exponential, mirroring the backend's own client
/// guidance; a persistent outage is reconciled by snapshot fetches, not
/// by hammering the channel.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values fail a semantic check.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Everything the client needs to reach its collaborators and size the
/// live view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `https://api.example.com/api`.
    pub api_base_url: String,

    /// URL of the push-channel endpoint delivering report updates.
    pub push_url: String,

    /// Maximum age of a report eligible for the live view.
    #[serde(default = "default_recency_window", with = "humantime_serde")]
    pub recency_window: Duration,

    /// Bound on the number of visible reports.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Delay between push-channel reconnect attempts.
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,

    /// Whether to pull a fresh snapshot after every successful
    /// (re)connect, closing the no-replay gap of the push channel.
    #[serde(default = "default_snapshot_on_connect")]
    pub snapshot_on_connect: bool,
}

const fn default_recency_window() -> Duration {
    DEFAULT_RECENCY_WINDOW
}

const fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

const fn default_reconnect_delay() -> Duration {
    DEFAULT_RECONNECT_DELAY
}

const fn default_snapshot_on_connect() -> bool {
    true
}

impl ClientConfig {
    /// Creates a config with the given endpoints and default tuning.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, push_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            push_url: push_url.into(),
            recency_window: default_recency_window(),
            max_items: default_max_items(),
            reconnect_delay: default_reconnect_delay(),
            snapshot_on_connect: default_snapshot_on_connect(),
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks beyond parsing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for empty URLs, a zero
    /// `max_items`, or a zero recency window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api_base_url must not be empty".to_string(),
            ));
        }
        if self.push_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "push_url must not be empty".to_string(),
            ));
        }
        if self.max_items == 0 {
            return Err(ConfigError::Validation(
                "max_items must be at least 1".to_string(),
            ));
        }
        if self.recency_window.is_zero() {
            return Err(ConfigError::Validation(
                "recency_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            api_base_url = "http://localhost:8080/api"
            push_url = "http://localhost:8080/ws/reports"
            "#,
        )
        .unwrap();
        assert_eq!(config.recency_window, DEFAULT_RECENCY_WINDOW);
        assert_eq!(config.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(config.reconnect_delay, DEFAULT_RECONNECT_DELAY);
        assert!(config.snapshot_on_connect);
    }

    #[test]
    fn humantime_durations_parse() {
        let config = ClientConfig::from_toml(
            r#"
            api_base_url = "http://localhost:8080/api"
            push_url = "http://localhost:8080/ws/reports"
            recency_window = "12h"
            reconnect_delay = "2s"
            max_items = 25
            snapshot_on_connect = false
            "#,
        )
        .unwrap();
        assert_eq!(config.recency_window, Duration::from_secs(12 * 3600));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_items, 25);
        assert!(!config.snapshot_on_connect);
    }

    #[test]
    fn empty_api_base_url_is_rejected() {
        let err = ClientConfig::from_toml(
            r#"
            api_base_url = ""
            push_url = "http://localhost:8080/ws/reports"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_max_items_is_rejected() {
        let err = ClientConfig::from_toml(
            r#"
            api_base_url = "http://localhost:8080/api"
            push_url = "http://localhost:8080/ws/reports"
            max_items = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_required_url_is_a_parse_error() {
        let err = ClientConfig::from_toml("max_items = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

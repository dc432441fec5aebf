//! Configuration for the content script.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::SerpveilError;
use crate::settings::HIDDEN_SITES_KEY;

/// Top-level content-script configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentScriptConfig {
    /// Settings key holding the hidden-site list.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Interval between result polls while waiting for results.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Interval between polls for the mutation watcher's root.
    #[serde(default = "default_poll_interval")]
    pub watch_poll_interval_ms: u64,
    /// Class names written into the page.
    #[serde(default)]
    pub class_names: ClassNames,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_storage_key() -> String {
    HIDDEN_SITES_KEY.to_string()
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for ContentScriptConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            poll_interval_ms: default_poll_interval(),
            watch_poll_interval_ms: default_poll_interval(),
            class_names: ClassNames::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ContentScriptConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SerpveilError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), SerpveilError> {
        if self.storage_key.trim().is_empty() {
            return Err(SerpveilError::Config("storage_key must not be empty".into()));
        }
        if self.poll_interval_ms == 0 || self.watch_poll_interval_ms == 0 {
            return Err(SerpveilError::Config("poll intervals must be positive".into()));
        }
        self.class_names.validate()
    }

    /// Sets the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the result poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the watcher root poll interval.
    #[must_use]
    pub fn with_watch_poll_interval(mut self, interval: Duration) -> Self {
        self.watch_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Result poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Watcher root poll interval as a Duration.
    #[must_use]
    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch_poll_interval_ms)
    }
}

/// Class names and attributes this crate writes into the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassNames {
    /// Flag on a hidden result.
    #[serde(default = "default_hidden")]
    pub hidden: String,
    /// Flag on a result the user revealed through its marker.
    #[serde(default = "default_unhidden")]
    pub unhidden: String,
    /// Flag on a classified, visible result.
    #[serde(default = "default_shown")]
    pub shown: String,
    /// Class of marker nodes.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Class of the hostname label inside a marker.
    #[serde(default = "default_marker_host")]
    pub marker_host: String,
    /// Class of hide controls.
    #[serde(default = "default_control")]
    pub control: String,
}

fn default_hidden() -> String {
    "serpveil-hidden".to_string()
}

fn default_unhidden() -> String {
    "serpveil-unhidden".to_string()
}

fn default_shown() -> String {
    "serpveil-shown".to_string()
}

fn default_marker() -> String {
    "serpveil-marker".to_string()
}

fn default_marker_host() -> String {
    "serpveil-marker-host".to_string()
}

fn default_control() -> String {
    "serpveil-control".to_string()
}

impl Default for ClassNames {
    fn default() -> Self {
        Self {
            hidden: default_hidden(),
            unhidden: default_unhidden(),
            shown: default_shown(),
            marker: default_marker(),
            marker_host: default_marker_host(),
            control: default_control(),
        }
    }
}

impl ClassNames {
    fn validate(&self) -> Result<(), SerpveilError> {
        let names = [
            &self.hidden,
            &self.unhidden,
            &self.shown,
            &self.marker,
            &self.marker_host,
            &self.control,
        ];
        for name in names {
            if name.is_empty() || name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_')) {
                return Err(SerpveilError::Config(format!("invalid class name '{name}'")));
            }
        }
        Ok(())
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"serpveil=debug"`.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
    /// Prefix lines with timestamps. Must be off where no system clock exists.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

fn default_filter() -> String {
    "serpveil=info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            timestamps: default_true(),
        }
    }
}

impl LoggingConfig {
    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Enables or disables timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContentScriptConfig::default();
        assert_eq!(config.storage_key, "hidden_sites");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.class_names.hidden, "serpveil-hidden");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ContentScriptConfig::from_json(
            r#"{"poll_interval_ms": 250, "class_names": {"marker": "my-marker"}, "logging": {"json": true}}"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.watch_poll_interval_ms, 500);
        assert_eq!(config.class_names.marker, "my-marker");
        assert_eq!(config.class_names.control, "serpveil-control");
        assert!(config.logging.json);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(ContentScriptConfig::from_json(r#"{"poll_interval_ms": 0}"#).is_err());
        assert!(ContentScriptConfig::from_json(r#"{"storage_key": " "}"#).is_err());
        assert!(ContentScriptConfig::from_json(r#"{"class_names": {"hidden": "a b"}}"#).is_err());
        assert!(ContentScriptConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_builders() {
        let config = ContentScriptConfig::new()
            .with_storage_key("blocked")
            .with_poll_interval(Duration::from_millis(100))
            .with_watch_poll_interval(Duration::from_secs(1));
        assert_eq!(config.storage_key, "blocked");
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.watch_poll_interval_ms, 1000);

        let logging = LoggingConfig::default()
            .with_filter("serpveil=debug")
            .with_json(true)
            .with_timestamps(false);
        assert_eq!(logging.filter, "serpveil=debug");
        assert!(!logging.timestamps);
    }
}

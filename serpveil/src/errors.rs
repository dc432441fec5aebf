//! Error types for serpveil.
//!
//! Nothing in this crate is fatal to the host page. These errors surface at
//! the seams (storage, DOM, configuration) and are logged by the callers that
//! drive a content script.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = SerpveilError> = std::result::Result<T, E>;

/// The main error type for serpveil operations.
#[derive(Debug, Error)]
pub enum SerpveilError {
    /// A settings store read or write failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A DOM operation failed.
    #[error("{0}")]
    Dom(#[from] DomError),

    /// A selector could not be parsed.
    #[error("{0}")]
    Selector(#[from] SelectorParseError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The logging subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Error raised by a [`SettingsStore`](crate::settings::SettingsStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Storage error on key '{key}': {message}")]
pub struct StorageError {
    /// The key being read or written.
    pub key: String,
    /// Backend-specific description.
    pub message: String,
}

impl StorageError {
    /// Creates a new storage error.
    #[must_use]
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Error raised by a [`Dom`](crate::dom::Dom) write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("DOM operation '{operation}' failed: {message}")]
pub struct DomError {
    /// The operation that failed (e.g. "insert_before").
    pub operation: &'static str,
    /// Backend-specific description.
    pub message: String,
}

impl DomError {
    /// Creates a new DOM error.
    #[must_use]
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Error raised when a selector string is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid selector '{input}': {reason}")]
pub struct SelectorParseError {
    /// The selector source.
    pub input: String,
    /// What was wrong with it.
    pub reason: String,
}

impl SelectorParseError {
    /// Creates a new selector parse error.
    #[must_use]
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::new("hidden_sites", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Storage error on key 'hidden_sites': quota exceeded"
        );
    }

    #[test]
    fn test_dom_error_converts() {
        let err: SerpveilError = DomError::new("prepend", "detached parent").into();
        assert!(matches!(err, SerpveilError::Dom(_)));
        assert_eq!(
            err.to_string(),
            "DOM operation 'prepend' failed: detached parent"
        );
    }

    #[test]
    fn test_selector_error_display() {
        let err = SelectorParseError::new("div..g", "empty class name");
        assert_eq!(err.to_string(), "Invalid selector 'div..g': empty class name");
    }
}

//! Mock collaborators for content-script tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::StorageError;
use crate::i18n::{Localizer, MessageKey};
use crate::runtime::{Clock, TokioClock};
use crate::settings::{ChangeListener, SettingsStore};

/// A settings store whose every read and write fails.
#[derive(Debug, Default)]
pub struct FailingSettingsStore {
    message: String,
    calls: Mutex<usize>,
    listeners: Mutex<usize>,
}

impl FailingSettingsStore {
    /// Creates a store failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Number of `get`/`set` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Number of listeners registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        *self.listeners.lock()
    }

    fn fail(&self, key: &str) -> StorageError {
        *self.calls.lock() += 1;
        StorageError::new(key, self.message.clone())
    }
}

#[async_trait(?Send)]
impl SettingsStore for FailingSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Err(self.fail(key))
    }

    async fn set(&self, key: &str, _value: Value) -> Result<(), StorageError> {
        Err(self.fail(key))
    }

    fn on_change(&self, _listener: ChangeListener) {
        *self.listeners.lock() += 1;
    }
}

/// A tokio clock that records every requested sleep.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    /// Creates a clock with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps requested so far.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait(?Send)]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        TokioClock.sleep(duration).await;
    }
}

/// A localizer backed by a fixed table; missing keys look up as empty.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizer {
    messages: HashMap<MessageKey, String>,
}

impl StaticLocalizer {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message.
    #[must_use]
    pub fn with_message(mut self, key: MessageKey, text: impl Into<String>) -> Self {
        self.messages.insert(key, text.into());
        self
    }
}

impl Localizer for StaticLocalizer {
    fn lookup(&self, key: MessageKey) -> String {
        self.messages.get(&key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::load_hidden_sites;

    #[tokio::test]
    async fn test_failing_store() {
        let store = FailingSettingsStore::new("quota exceeded");
        let err = load_hidden_sites(&store, "hidden_sites").await.unwrap_err();
        assert_eq!(err.key, "hidden_sites");
        assert_eq!(err.message, "quota exceeded");
        store.on_change(Box::new(|_| {}));
        assert_eq!(store.call_count(), 1);
        assert_eq!(store.listener_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_clock() {
        let clock = RecordingClock::new();
        clock.sleep(Duration::from_millis(500)).await;
        clock.sleep(Duration::from_millis(250)).await;
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(250)]
        );
    }

    #[test]
    fn test_static_localizer_falls_back() {
        let localizer = StaticLocalizer::new().with_message(MessageKey::HideResult, "Masquer");
        assert_eq!(localizer.message(MessageKey::HideResult), "Masquer");
        assert_eq!(localizer.message(MessageKey::ResultHidden), "Result hidden from");
    }
}

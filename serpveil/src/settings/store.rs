//! Settings store contract and in-memory implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use crate::errors::StorageError;

/// A change to one key, delivered to [`SettingsStore::on_change`] listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsChange {
    /// The key that changed.
    pub key: String,
    /// Value before the change.
    pub old_value: Option<Value>,
    /// Value after the change.
    pub new_value: Option<Value>,
}

/// Listener invoked for every settings change.
pub type ChangeListener = Box<dyn Fn(&SettingsChange)>;

/// Protocol for persisted key/value settings.
///
/// Implementations live on the page's single thread, so futures are not
/// required to be `Send`.
#[async_trait(?Send)]
pub trait SettingsStore {
    /// Reads a key. `Ok(None)` when it was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Writes a key and notifies listeners.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Registers a change listener.
    fn on_change(&self, listener: ChangeListener);
}

/// An in-memory settings store.
///
/// Listeners run synchronously inside `set`. Reads and writes can be made to
/// fail for tests with [`fail_reads`](Self::fail_reads) and
/// [`fail_writes`](Self::fail_writes).
#[derive(Default)]
pub struct MemorySettingsStore {
    values: RefCell<HashMap<String, Value>>,
    listeners: RefCell<Vec<ChangeListener>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    reads: Cell<usize>,
}

impl fmt::Debug for MemorySettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySettingsStore")
            .field("values", &self.values.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .field("fail_reads", &self.fail_reads.get())
            .field("fail_writes", &self.fail_writes.get())
            .finish()
    }
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one value.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let store = Self::new();
        store.values.borrow_mut().insert(key.into(), value);
        store
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of `get` calls so far, failed ones included.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Reads a value without going through the async contract.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }
}

#[async_trait(?Send)]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.reads.set(self.reads.get() + 1);
        if self.fail_reads.get() {
            return Err(StorageError::new(key, "read failure injected"));
        }
        Ok(self.values.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::new(key, "write failure injected"));
        }
        let old_value = self.values.borrow_mut().insert(key.to_string(), value.clone());
        let change = SettingsChange {
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        };
        for listener in self.listeners.borrow().iter() {
            listener(&change);
        }
        Ok(())
    }

    fn on_change(&self, listener: ChangeListener) {
        self.listeners.borrow_mut().push(listener);
    }
}

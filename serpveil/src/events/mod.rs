//! Event sink system for observability.
//!
//! The reconciler, the mutation watcher and the content-script driver report
//! lifecycle events through an [`EventSink`]. Event names are dotted,
//! `component.what`, and listed below.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A provider descriptor was selected for the page.
pub const PROVIDER_SELECTED: &str = "provider.selected";
/// A trigger started waiting for results.
pub const RECONCILE_WAITING: &str = "reconcile.waiting";
/// A reconciliation pass finished.
pub const RECONCILE_COMPLETED: &str = "reconcile.completed";
/// A result was hidden.
pub const RESULT_HIDDEN: &str = "result.hidden";
/// A result hidden under a since-removed hostname was restored.
pub const RESULT_REVERSED: &str = "result.reversed";
/// The user revealed a hidden result through its marker.
pub const RESULT_REVEALED: &str = "result.revealed";
/// The hidden-site list could not be read.
pub const SETTINGS_READ_FAILED: &str = "settings.read_failed";
/// The mutation watcher subscribed to its root.
pub const WATCHER_ATTACHED: &str = "watcher.attached";
/// The mutation watcher was disconnected.
pub const WATCHER_DETACHED: &str = "watcher.detached";

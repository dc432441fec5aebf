//! Page reconciliation.
//!
//! This module provides:
//! - [`Reconciler`]: one pass applying the hidden-site list to the results
//! - [`MutationWatcher`]: re-triggers passes when the result list is replaced
//! - [`ContentScript`]: the per-page driver tying provider, settings, DOM and
//!   watcher together

mod reconciler;
mod script;
mod watcher;


pub use reconciler::{ReconcileReport, Reconciler, ResultState};
pub use script::{ContentScript, ContentScriptBuilder, ReconcilerState};
pub use watcher::{MutationWatcher, Suspension};

use serde::Serialize;

/// Why a pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The page finished loading.
    PageLoad,
    /// The hidden-site list changed.
    SettingsChanged,
    /// The observed result list changed.
    Mutation,
}

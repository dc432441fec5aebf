//! # Serpveil
//!
//! Hide search-engine results by hostname.
//!
//! Serpveil keeps a persisted list of hostnames and, on a supported search
//! results page, collapses every result linking to one of them behind a small
//! marker the user can click to reveal it. It provides:
//!
//! - **Provider descriptors**: each search engine's DOM conventions as data,
//!   selected once per page from a hostname table
//! - **Reconciliation**: an idempotent pass that hides, restores and labels
//!   results, driven by page load, settings changes and result-list mutations
//! - **DOM abstraction**: a small trait the browser binding implements over
//!   `web-sys`, plus an in-memory document for tests and native use
//! - **Settings**: the hidden-site list over an async key/value store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serpveil::prelude::*;
//! use serpveil::testing::TestPage;
//! use std::rc::Rc;
//!
//! let page = TestPage::for_provider(ProviderKind::DuckDuckGo);
//! let dom = Rc::new(page.load());
//! let store = Rc::new(MemorySettingsStore::with_value(
//!     HIDDEN_SITES_KEY,
//!     serde_json::json!(["spam.example"]),
//! ));
//! let script = ContentScript::new(dom, store, TokioClock, select_provider(&page.host()))?;
//!
//! script.start();
//! script.run().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod dom;
pub mod errors;
pub mod events;
pub mod i18n;
pub mod observability;
pub mod provider;
pub mod reconcile;
pub mod runtime;
pub mod settings;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ClassNames, ContentScriptConfig, LoggingConfig};
    pub use crate::dom::{Dom, MemoryDocument, MutationObserverHandle, ObserveMutations, Selector};
    pub use crate::errors::{DomError, SerpveilError, StorageError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::i18n::{DefaultLocalizer, Labels, Localizer, MessageKey};
    pub use crate::observability::init_logging;
    pub use crate::provider::{
        select_provider, MarkerPlacement, ProviderDescriptor, ProviderKind, ProviderRegistry,
    };
    pub use crate::reconcile::{
        ContentScript, ReconcileReport, Reconciler, ReconcilerState, Trigger,
    };
    pub use crate::runtime::{Clock, TokioClock};
    pub use crate::settings::{
        HiddenSiteSet, MemorySettingsStore, SettingsStore, HIDDEN_SITES_KEY,
    };
    pub use crate::utils::canonical_hostname;
}

//! Persisted settings.
//!
//! This module provides:
//! - The [`SettingsStore`] contract the content script reads through
//! - [`MemorySettingsStore`], an in-process store with change notification
//! - [`HiddenSiteSet`], the persisted list of hostnames to hide, and the
//!   load/save/add helpers used by the content script, options form and
//!   popup action

mod hidden_sites;
mod store;

pub use hidden_sites::{add_hidden_site, load_hidden_sites, save_hidden_sites, HiddenSiteSet};
pub use store::{ChangeListener, MemorySettingsStore, SettingsChange, SettingsStore};

/// Storage key the hidden-site list lives under.
pub const HIDDEN_SITES_KEY: &str = "hidden_sites";

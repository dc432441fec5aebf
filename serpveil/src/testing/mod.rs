//! Testing utilities for serpveil.
//!
//! This module provides:
//! - Result-page fixtures for every built-in provider
//! - Mock settings store, clock and localizer

pub mod fixtures;
mod mocks;

pub use fixtures::{result_fragment, TestPage, SPAM_HOST};
pub use mocks::{FailingSettingsStore, RecordingClock, StaticLocalizer};

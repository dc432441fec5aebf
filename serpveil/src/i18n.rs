//! Localized strings.

use serde::{Deserialize, Serialize};

/// The strings this crate writes into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    /// Label of a hidden-result marker.
    ResultHidden,
    /// Text of the hide control.
    HideResult,
    /// Tooltip of the hide control.
    HideResultTitle,
}

impl MessageKey {
    /// The message name used by the extension's locale files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ResultHidden => "result_hidden",
            Self::HideResult => "hide_result",
            Self::HideResultTitle => "hide_result_title",
        }
    }

    /// English text.
    #[must_use]
    pub fn default_text(self) -> &'static str {
        match self {
            Self::ResultHidden => "Result hidden from",
            Self::HideResult => "Hide",
            Self::HideResultTitle => "Hide results from this site",
        }
    }
}

/// Opaque string provider.
pub trait Localizer {
    /// Looks up a message. Implementations return an empty string when the
    /// key is missing.
    fn lookup(&self, key: MessageKey) -> String;

    /// Looks up a message, falling back to English when the lookup is empty.
    fn message(&self, key: MessageKey) -> String {
        let text = self.lookup(key);
        if text.is_empty() {
            key.default_text().to_string()
        } else {
            text
        }
    }
}

/// The built-in English strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn lookup(&self, key: MessageKey) -> String {
        key.default_text().to_string()
    }
}

/// Strings resolved once per page so a pass does not call the localizer per
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    /// Marker label.
    pub result_hidden: String,
    /// Control text.
    pub hide_result: String,
    /// Control tooltip.
    pub hide_result_title: String,
}

impl Labels {
    /// Resolves every label through `localizer`.
    pub fn resolve(localizer: &dyn Localizer) -> Self {
        Self {
            result_hidden: localizer.message(MessageKey::ResultHidden),
            hide_result: localizer.message(MessageKey::HideResult),
            hide_result_title: localizer.message(MessageKey::HideResultTitle),
        }
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::resolve(&DefaultLocalizer)
    }
}

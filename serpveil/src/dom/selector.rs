//! CSS selectors as provider data.
//!
//! A [`Selector`] keeps its source text next to the compiled
//! [`scraper::Selector`]. Parsing validates provider tables at load time,
//! the compiled form drives matching in [`MemoryDocument`](super::MemoryDocument),
//! and `Display` returns the source so browser backends can hand it straight
//! to `querySelectorAll`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SelectorParseError;

/// A parsed selector group.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    source: String,
    compiled: scraper::Selector,
}

impl Selector {
    /// Parses a selector string.
    pub fn parse(input: &str) -> Result<Self, SelectorParseError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorParseError::new(input, "empty selector"));
        }
        let compiled = scraper::Selector::parse(source)
            .map_err(|e| SelectorParseError::new(input, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    /// A selector matching elements carrying `class`.
    pub fn class(class: &str) -> Result<Self, SelectorParseError> {
        Self::parse(&format!(".{class}"))
    }

    /// The source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element` matches.
    #[must_use]
    pub fn matches(&self, element: &scraper::ElementRef<'_>) -> bool {
        self.compiled.matches(element)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.source
    }
}

//! Provider registry: hostname → descriptor.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::descriptor::{
    LinkStrategy, MarkerPlacement, ProviderDescriptor, ProviderKind, ResultLocator,
};
use crate::dom::Selector;
use crate::errors::{SelectorParseError, SerpveilError};

/// A hostname test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum HostPattern {
    /// The whole hostname.
    Exact(String),
    /// A substring of the hostname.
    Contains(String),
    /// A hostname prefix.
    Prefix(String),
    /// A hostname suffix.
    Suffix(String),
}

impl HostPattern {
    /// Tests a hostname, ignoring ASCII case.
    #[must_use]
    pub fn matches(&self, hostname: &str) -> bool {
        let host = hostname.to_ascii_lowercase();
        match self {
            Self::Exact(p) => host == p.to_ascii_lowercase(),
            Self::Contains(p) => host.contains(&p.to_ascii_lowercase()),
            Self::Prefix(p) => host.starts_with(&p.to_ascii_lowercase()),
            Self::Suffix(p) => host.ends_with(&p.to_ascii_lowercase()),
        }
    }
}

/// One row of the registry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Host test.
    pub pattern: HostPattern,
    /// Descriptor selected when the test passes.
    pub provider: ProviderDescriptor,
}

/// Ordered table of providers; the first matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
}

impl ProviderRegistry {
    /// Creates a registry from entries, in priority order.
    #[must_use]
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// The built-in provider table.
    ///
    /// Falls back to an empty registry (every host unsupported) if a built-in
    /// selector fails to parse.
    #[must_use]
    pub fn builtin() -> Self {
        match builtin_entries() {
            Ok(entries) => Self::new(entries),
            Err(e) => {
                error!(error = %e, "Built-in provider table is invalid");
                Self::default()
            }
        }
    }

    /// Parses a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, SerpveilError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Puts `other`'s entries ahead of this registry's.
    #[must_use]
    pub fn with_overrides(mut self, other: Self) -> Self {
        let mut entries = other.entries;
        entries.append(&mut self.entries);
        self.entries = entries;
        self
    }

    /// Adds an entry with top priority.
    #[must_use]
    pub fn with_entry_first(mut self, pattern: HostPattern, provider: ProviderDescriptor) -> Self {
        self.entries.insert(0, RegistryEntry { pattern, provider });
        self
    }

    /// Entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Selects the descriptor for `hostname`.
    #[must_use]
    pub fn select_provider(&self, hostname: &str) -> Arc<ProviderDescriptor> {
        let selected = self
            .entries
            .iter()
            .find(|entry| entry.pattern.matches(hostname))
            .map_or_else(ProviderDescriptor::unsupported, |entry| entry.provider.clone());
        debug!(hostname = %hostname, provider = %selected.name, "Selected provider");
        Arc::new(selected)
    }
}

/// Selects a descriptor from the built-in table.
#[must_use]
pub fn select_provider(hostname: &str) -> Arc<ProviderDescriptor> {
    ProviderRegistry::builtin().select_provider(hostname)
}

fn descriptor(
    name: &str,
    kind: ProviderKind,
    results: ResultLocator,
    placement: MarkerPlacement,
    watch_root: Option<&str>,
) -> Result<ProviderDescriptor, SelectorParseError> {
    Ok(ProviderDescriptor {
        name: name.to_string(),
        kind,
        results,
        link: LinkStrategy::FirstAnchor,
        placement,
        watch_root: watch_root.map(Selector::parse).transpose()?,
    })
}

fn matching(selector: &str) -> Result<ResultLocator, SelectorParseError> {
    Ok(ResultLocator::Matching {
        selector: Selector::parse(selector)?,
    })
}

fn builtin_entries() -> Result<Vec<RegistryEntry>, SelectorParseError> {
    use HostPattern::{Contains, Prefix};
    use MarkerPlacement::{InsertBefore, PrependToParent};

    let yahoo = ProviderDescriptor {
        link: LinkStrategy::DisplayedText {
            selector: Selector::parse(".compTitle span")?,
        },
        ..descriptor("Yahoo", ProviderKind::Yahoo, matching("#web .algo")?, PrependToParent, None)?
    };

    Ok(vec![
        RegistryEntry {
            pattern: Contains("duckduckgo.com".into()),
            provider: descriptor(
                "DuckDuckGo",
                ProviderKind::DuckDuckGo,
                matching(r#".react-results--main article[data-testid="result"]"#)?,
                PrependToParent,
                Some(".react-results--main"),
            )?,
        },
        RegistryEntry {
            pattern: Prefix("www.google.".into()),
            provider: descriptor(
                "Google",
                ProviderKind::Google,
                matching("#rso div.g")?,
                InsertBefore,
                Some("#rso"),
            )?,
        },
        RegistryEntry {
            pattern: Contains("bing.com".into()),
            provider: descriptor(
                "Bing",
                ProviderKind::Bing,
                matching("#b_results li.b_algo")?,
                PrependToParent,
                None,
            )?,
        },
        RegistryEntry {
            pattern: Contains("startpage.com".into()),
            provider: descriptor(
                "Startpage",
                ProviderKind::Startpage,
                ResultLocator::AncestorOf {
                    child: Selector::parse("a.result-link")?,
                    ancestor: Selector::parse(".result")?,
                },
                InsertBefore,
                None,
            )?,
        },
        RegistryEntry {
            pattern: Contains("ecosia.org".into()),
            provider: descriptor(
                "Ecosia",
                ProviderKind::Ecosia,
                matching(".mainline article.result")?,
                PrependToParent,
                None,
            )?,
        },
        RegistryEntry {
            pattern: Prefix("search.yahoo.".into()),
            provider: yahoo,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_table_parses() {
        let entries = builtin_entries().unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(ProviderRegistry::builtin().entries().len(), 6);
    }

    #[test]
    fn test_select_known_hosts() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.select_provider("duckduckgo.com").kind, ProviderKind::DuckDuckGo);
        assert_eq!(registry.select_provider("html.duckduckgo.com").kind, ProviderKind::DuckDuckGo);
        assert_eq!(registry.select_provider("www.google.co.uk").kind, ProviderKind::Google);
        assert_eq!(registry.select_provider("WWW.GOOGLE.COM").kind, ProviderKind::Google);
        assert_eq!(registry.select_provider("www.bing.com").kind, ProviderKind::Bing);
        assert_eq!(registry.select_provider("www.startpage.com").kind, ProviderKind::Startpage);
        assert_eq!(registry.select_provider("www.ecosia.org").kind, ProviderKind::Ecosia);
        assert_eq!(registry.select_provider("search.yahoo.co.jp").kind, ProviderKind::Yahoo);
    }

    #[test]
    fn test_unknown_host_is_unsupported() {
        let provider = select_provider("example.com");
        assert_eq!(provider.kind, ProviderKind::Unsupported);
        assert_eq!(provider.name, "Unknown");
        assert!(!provider.is_supported());
        // "google." alone is not the search host.
        assert_eq!(select_provider("mail.google.com").kind, ProviderKind::Unsupported);
    }

    #[test]
    fn test_builtin_descriptor_details() {
        let registry = ProviderRegistry::builtin();
        let google = registry.select_provider("www.google.com");
        assert_eq!(google.placement, MarkerPlacement::InsertBefore);
        assert_eq!(google.watch_root.as_ref().map(ToString::to_string).as_deref(), Some("#rso"));

        let yahoo = registry.select_provider("search.yahoo.com");
        assert!(matches!(yahoo.link, LinkStrategy::DisplayedText { .. }));
        assert_eq!(yahoo.placement, MarkerPlacement::PrependToParent);
    }

    #[test]
    fn test_first_match_wins() {
        let custom = ProviderDescriptor {
            name: "Intranet".into(),
            kind: ProviderKind::Custom,
            ..ProviderDescriptor::unsupported()
        };
        let registry = ProviderRegistry::builtin()
            .with_entry_first(HostPattern::Suffix(".bing.com".into()), custom);
        assert_eq!(registry.select_provider("www.bing.com").name, "Intranet");
        assert_eq!(registry.select_provider("bing.com").kind, ProviderKind::Bing);
    }

    #[test]
    fn test_from_json_overrides() {
        let json = r##"[{
            "pattern": {"match": "exact", "value": "search.example.net"},
            "provider": {
                "name": "Example",
                "kind": "custom",
                "results": {"type": "matching", "selector": "#hits .hit"},
                "link": {"type": "first_anchor"},
                "placement": "prepend_to_parent",
                "watch_root": "#hits"
            }
        }]"##;
        let registry = ProviderRegistry::builtin().with_overrides(ProviderRegistry::from_json(json).unwrap());
        assert_eq!(registry.entries().len(), 7);
        assert_eq!(registry.select_provider("search.example.net").name, "Example");
        assert_eq!(registry.select_provider("www.bing.com").kind, ProviderKind::Bing);
        assert!(ProviderRegistry::from_json(r#"[{"pattern": 1}]"#).is_err());
    }
}

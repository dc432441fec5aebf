//! The persisted hidden-site list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::store::SettingsStore;
use crate::errors::StorageError;
use crate::utils::canonical_hostname;

/// An insertion-ordered set of canonical hostnames.
///
/// Entries that do not parse as a hostname are kept, lowercased, so the
/// user still sees them in the options form; they never match a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct HiddenSiteSet {
    entries: Vec<String>,
    index: HashSet<String>,
}

fn canonical_entry(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(canonical_hostname(trimmed).unwrap_or_else(|| trimmed.to_lowercase()))
}

impl HiddenSiteSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizes and inserts an entry. Returns false for blanks and duplicates.
    pub fn insert(&mut self, raw: &str) -> bool {
        let Some(entry) = canonical_entry(raw) else {
            return false;
        };
        if !self.index.insert(entry.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes an entry, matched after canonicalization.
    pub fn remove(&mut self, raw: &str) -> bool {
        let Some(entry) = canonical_entry(raw) else {
            return false;
        };
        if !self.index.remove(&entry) {
            return false;
        }
        self.entries.retain(|e| *e != entry);
        true
    }

    /// Whether `host` (already canonical) is hidden.
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.index.contains(host)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes a stored value.
    ///
    /// Accepts a JSON array of strings or a newline-separated string.
    /// Absent values, `null` and any other shape decode to an empty set.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(text)) => Self::from_lines(text),
            _ => Self::new(),
        }
    }

    /// Encodes as a JSON array in insertion order.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self.entries.clone())
    }

    /// Parses the options-form encoding: one entry per line.
    #[must_use]
    pub fn from_lines(text: &str) -> Self {
        text.lines().collect()
    }

    /// Renders the options-form encoding.
    #[must_use]
    pub fn to_lines(&self) -> String {
        self.entries.join("\n")
    }
}

impl<'a> FromIterator<&'a str> for HiddenSiteSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for raw in iter {
            set.insert(raw);
        }
        set
    }
}

impl From<Vec<String>> for HiddenSiteSet {
    fn from(entries: Vec<String>) -> Self {
        entries.iter().map(String::as_str).collect()
    }
}

impl From<HiddenSiteSet> for Vec<String> {
    fn from(set: HiddenSiteSet) -> Self {
        set.entries
    }
}

/// Reads the hidden-site list from `store`.
pub async fn load_hidden_sites<S>(store: &S, key: &str) -> Result<HiddenSiteSet, StorageError>
where
    S: SettingsStore + ?Sized,
{
    let value = store.get(key).await?;
    Ok(HiddenSiteSet::from_value(value.as_ref()))
}

/// Replaces the stored hidden-site list (options form save).
pub async fn save_hidden_sites<S>(
    store: &S,
    key: &str,
    sites: &HiddenSiteSet,
) -> Result<(), StorageError>
where
    S: SettingsStore + ?Sized,
{
    store.set(key, sites.to_value()).await
}

/// Adds one entry to the stored list (popup action).
///
/// Returns the canonical entry when the list changed, `None` when the input
/// was blank or already listed. Nothing is written in that case.
pub async fn add_hidden_site<S>(
    store: &S,
    key: &str,
    raw: &str,
) -> Result<Option<String>, StorageError>
where
    S: SettingsStore + ?Sized,
{
    let mut sites = load_hidden_sites(store, key).await?;
    if !sites.insert(raw) {
        return Ok(None);
    }
    save_hidden_sites(store, key, &sites).await?;
    Ok(sites.iter().last().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_insert_canonicalizes_and_dedupes() {
        let mut set = HiddenSiteSet::new();
        assert!(set.insert("http://example.com/page"));
        assert!(!set.insert("https://example.com/"));
        assert!(!set.insert("EXAMPLE.com"));
        assert!(!set.insert("   "));
        assert!(set.insert("b.org"));
        assert!(set.contains("example.com"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["example.com", "b.org"]);
    }

    #[test]
    fn test_malformed_entries_never_match() {
        let mut set = HiddenSiteSet::new();
        assert!(set.insert("Not A Host"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["not a host"]);
        assert!(!set.contains("not"));
        assert!(!set.contains("host"));
    }

    #[test]
    fn test_remove() {
        let mut set: HiddenSiteSet = ["a.com", "b.com"].into_iter().collect();
        assert!(set.remove("https://a.com/x"));
        assert!(!set.remove("a.com"));
        assert_eq!(set.len(), 1);
        assert!(!set.contains("a.com"));
    }

    #[test]
    fn test_from_value_shapes() {
        assert!(HiddenSiteSet::from_value(None).is_empty());
        assert!(HiddenSiteSet::from_value(Some(&Value::Null)).is_empty());
        assert!(HiddenSiteSet::from_value(Some(&json!({"a": 1}))).is_empty());

        let from_array = HiddenSiteSet::from_value(Some(&json!(["a.com", 3, "B.com"])));
        assert_eq!(from_array.iter().collect::<Vec<_>>(), vec!["a.com", "b.com"]);

        let from_text = HiddenSiteSet::from_value(Some(&json!("a.com\n\nhttps://c.net/x\n")));
        assert_eq!(from_text.iter().collect::<Vec<_>>(), vec!["a.com", "c.net"]);
    }

    #[test]
    fn test_lines_and_value_encoding() {
        let set = HiddenSiteSet::from_lines("z.com\na.com\nz.com");
        assert_eq!(set.to_lines(), "z.com\na.com");
        assert_eq!(set.to_value(), json!(["z.com", "a.com"]));
    }

    #[test]
    fn test_serde_round_trip_keeps_order() {
        let set = HiddenSiteSet::from_lines("b.com\na.com");
        let encoded = serde_json::to_string(&set).unwrap();
        assert_eq!(encoded, r#"["b.com","a.com"]"#);
        let decoded: HiddenSiteSet = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, set);
    }

    #[tokio::test]
    async fn test_add_hidden_site() {
        let store = MemorySettingsStore::new();
        let added = add_hidden_site(&store, "hidden_sites", "https://A.com/path").await.unwrap();
        assert_eq!(added.as_deref(), Some("a.com"));
        let again = add_hidden_site(&store, "hidden_sites", "a.com").await.unwrap();
        assert_eq!(again, None);
        assert_eq!(store.peek("hidden_sites"), Some(json!(["a.com"])));
    }

    #[tokio::test]
    async fn test_load_propagates_storage_errors() {
        let store = MemorySettingsStore::new();
        store.fail_reads(true);
        assert!(load_hidden_sites(&store, "hidden_sites").await.is_err());
    }
}

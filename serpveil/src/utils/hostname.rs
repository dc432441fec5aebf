//! Hostname canonicalization.
//!
//! Hidden-site entries and result links are compared by canonical hostname:
//! lowercase, no scheme, port, path, query or trailing dot.

use url::Url;

/// Extracts the canonical hostname from a URL or bare hostname.
///
/// Inputs without a scheme are parsed as if prefixed with `http://`, so
/// `example.com`, `example.com:8080/a` and `https://EXAMPLE.com/?q` all
/// yield `example.com`. Returns `None` for input that does not parse to a
/// hostname.
#[must_use]
pub fn canonical_hostname(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("http://{trimmed}"))
    }
    .ok()?;

    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Extracts a hostname from a displayed-URL label such as
/// `"www.example.com › docs › intro"`.
#[must_use]
pub fn hostname_from_display_text(text: &str) -> Option<String> {
    let first = text
        .split(|c: char| c.is_whitespace() || c == '›')
        .find(|part| !part.is_empty())?;
    canonical_hostname(first)
}

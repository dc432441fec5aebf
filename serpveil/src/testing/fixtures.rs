//! Result-page fixtures for each built-in provider.
//!
//! Every page lists three results. The second one always links to
//! [`SPAM_HOST`]; on Bing the third has no link at all.

use crate::provider::ProviderKind;

/// Host linked from the second result of every fixture.
pub const SPAM_HOST: &str = "spam.example";

/// DuckDuckGo page URL.
pub const DUCKDUCKGO_URL: &str = "https://duckduckgo.com/?q=rust";

/// DuckDuckGo results page.
pub const DUCKDUCKGO: &str = r#"<!DOCTYPE html>
<html><body>
<div id="react-layout">
  <section class="react-results--main">
    <ol>
      <li data-layout="organic"><article data-testid="result">
        <h2><a href="https://www.rust-lang.org/">Rust Programming Language</a></h2>
        <p>A language empowering everyone.</p>
      </article></li>
      <li data-layout="organic"><article data-testid="result">
        <h2><a href="https://spam.example/rust-tips">10 Rust tips</a></h2>
      </article></li>
      <li data-layout="organic"><article data-testid="result">
        <h2><a href="https://docs.rs/">Docs.rs</a></h2>
      </article></li>
    </ol>
  </section>
</div>
</body></html>"#;

/// Google page URL.
pub const GOOGLE_URL: &str = "https://www.google.com/search?q=rust";

/// Google results page.
pub const GOOGLE: &str = r#"<!DOCTYPE html>
<html><body>
<div id="search"><div id="rso">
  <div class="g"><div><a href="https://www.rust-lang.org/"><h3>Rust</h3></a></div></div>
  <div class="g"><div><a href="https://spam.example/page"><h3>Spam</h3></a></div></div>
  <div class="g"><div><a href="https://doc.rust-lang.org/book/"><h3>The Book</h3></a></div></div>
</div></div>
</body></html>"#;

/// Bing page URL.
pub const BING_URL: &str = "https://www.bing.com/search?q=rust";

/// Bing results page. The third result has no link.
pub const BING: &str = r#"<!DOCTYPE html>
<html><body>
<ol id="b_results">
  <li class="b_algo"><h2><a href="https://www.rust-lang.org/">Rust</a></h2></li>
  <li class="b_algo"><h2><a href="https://spam.example/">Spam</a></h2></li>
  <li class="b_algo"><p>Related searches</p></li>
</ol>
</body></html>"#;

/// Startpage page URL.
pub const STARTPAGE_URL: &str = "https://www.startpage.com/sp/search";

/// Startpage results page.
pub const STARTPAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="w-gl">
  <div class="result"><a class="result-link" href="https://docs.rs/tokio"><h2>tokio</h2></a><p>Runtime.</p></div>
  <div class="result"><a class="result-link" href="https://spam.example/x"><h2>Spam</h2></a></div>
  <div class="result"><a class="result-link" href="https://crates.io/"><h2>crates.io</h2></a></div>
</div>
</body></html>"#;

/// Ecosia page URL.
pub const ECOSIA_URL: &str = "https://www.ecosia.org/search?q=rust";

/// Ecosia results page.
pub const ECOSIA: &str = r#"<!DOCTYPE html>
<html><body>
<div class="mainline">
  <article class="result"><a href="https://crates.io/">crates.io</a></article>
  <article class="result"><a href="https://spam.example/a">Spam</a></article>
  <article class="result"><a href="https://lib.rs/">lib.rs</a></article>
</div>
</body></html>"#;

/// Yahoo page URL.
pub const YAHOO_URL: &str = "https://search.yahoo.com/search?p=rust";

/// Yahoo results page. Links are redirects; the displayed URL carries the host.
pub const YAHOO: &str = r#"<!DOCTYPE html>
<html><body>
<div id="web"><ol>
  <li><div class="algo"><div class="compTitle">
    <a href="https://r.search.yahoo.com/_ylt=a/RU=rust-lang"><h3>Rust</h3></a>
    <span>www.rust-lang.org</span></div></div></li>
  <li><div class="algo"><div class="compTitle">
    <a href="https://r.search.yahoo.com/_ylt=b/RU=spam"><h3>Spam</h3></a>
    <span>spam.example › tips</span></div></div></li>
  <li><div class="algo"><div class="compTitle">
    <a href="https://r.search.yahoo.com/_ylt=c/RU=docs"><h3>Docs</h3></a>
    <span>docs.rs › tokio</span></div></div></li>
</ol></div>
</body></html>"#;

/// A page on a host no provider handles.
pub const UNSUPPORTED_URL: &str = "https://example.com/search?q=rust";

/// Unsupported page.
pub const UNSUPPORTED: &str = r#"<!DOCTYPE html>
<html><body>
<div class="g"><a href="https://spam.example/">Looks like a result</a></div>
</body></html>"#;

/// A page to load in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestPage {
    /// Page markup.
    pub html: &'static str,
    /// Page URL; its host selects the provider.
    pub url: &'static str,
}

impl TestPage {
    /// The fixture for `kind`. Custom and unsupported kinds get the
    /// unsupported page.
    #[must_use]
    pub fn for_provider(kind: ProviderKind) -> Self {
        let (html, url) = match kind {
            ProviderKind::DuckDuckGo => (DUCKDUCKGO, DUCKDUCKGO_URL),
            ProviderKind::Google => (GOOGLE, GOOGLE_URL),
            ProviderKind::Bing => (BING, BING_URL),
            ProviderKind::Startpage => (STARTPAGE, STARTPAGE_URL),
            ProviderKind::Ecosia => (ECOSIA, ECOSIA_URL),
            ProviderKind::Yahoo => (YAHOO, YAHOO_URL),
            ProviderKind::Custom | ProviderKind::Unsupported => (UNSUPPORTED, UNSUPPORTED_URL),
        };
        Self { html, url }
    }

    /// Hostname of the page URL.
    #[must_use]
    pub fn host(&self) -> String {
        url::Url::parse(self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Parses the page into a document.
    #[must_use]
    pub fn load(&self) -> crate::dom::MemoryDocument {
        crate::dom::MemoryDocument::parse(self.html, Some(self.url))
    }
}

/// Markup of one extra result for `kind`, as its page script would render it.
#[must_use]
pub fn result_fragment(kind: ProviderKind, href: &str, title: &str) -> String {
    match kind {
        ProviderKind::DuckDuckGo => format!(
            r#"<li data-layout="organic"><article data-testid="result"><h2><a href="{href}">{title}</a></h2></article></li>"#
        ),
        ProviderKind::Google => {
            format!(r#"<div class="g"><div><a href="{href}"><h3>{title}</h3></a></div></div>"#)
        }
        ProviderKind::Bing => format!(r#"<li class="b_algo"><h2><a href="{href}">{title}</a></h2></li>"#),
        ProviderKind::Startpage => {
            format!(r#"<div class="result"><a class="result-link" href="{href}"><h2>{title}</h2></a></div>"#)
        }
        ProviderKind::Ecosia => format!(r#"<article class="result"><a href="{href}">{title}</a></article>"#),
        ProviderKind::Yahoo => format!(
            r#"<li><div class="algo"><div class="compTitle"><a href="{href}"><h3>{title}</h3></a><span>{href}</span></div></div></li>"#
        ),
        ProviderKind::Custom | ProviderKind::Unsupported => format!(r#"<div><a href="{href}">{title}</a></div>"#),
    }
}

/// A page with `count` results for the benchmark, every tenth on
/// [`SPAM_HOST`].
#[must_use]
pub fn large_duckduckgo_page(count: usize) -> String {
    let results: String = (0..count)
        .map(|i| {
            let href = if i % 10 == 0 {
                format!("https://{SPAM_HOST}/{i}")
            } else {
                format!("https://site{i}.example/")
            };
            result_fragment(ProviderKind::DuckDuckGo, &href, &format!("Result {i}"))
        })
        .collect();
    format!(r#"<html><body><section class="react-results--main"><ol>{results}</ol></section></body></html>"#)
}

//! Provider descriptors: one search engine's DOM conventions, as data.

use serde::{Deserialize, Serialize};

use super::PAIR_ATTRIBUTE;
use crate::dom::{Dom, Selector};
use crate::utils::{canonical_hostname, hostname_from_display_text};

/// Identity of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// DuckDuckGo.
    DuckDuckGo,
    /// Google.
    Google,
    /// Bing.
    Bing,
    /// Startpage.
    Startpage,
    /// Ecosia.
    Ecosia,
    /// Yahoo.
    Yahoo,
    /// A descriptor loaded from configuration.
    Custom,
    /// No provider matched the host.
    Unsupported,
}

/// How result elements are found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultLocator {
    /// Nothing is a result.
    None,
    /// Elements matching a selector.
    Matching {
        /// The result selector.
        selector: Selector,
    },
    /// Elements matching `child`, mapped to their closest `ancestor`.
    AncestorOf {
        /// Selector for an element inside each result.
        child: Selector,
        /// Selector for the result itself.
        ancestor: Selector,
    },
}

/// How a result's link is extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkStrategy {
    /// No link is ever extracted.
    None,
    /// The first `a[href]` descendant.
    FirstAnchor,
    /// The first descendant anchor matching a provider selector.
    Anchor {
        /// Anchor selector.
        selector: Selector,
    },
    /// The text of a displayed-URL element.
    DisplayedText {
        /// Selector of the element showing the URL.
        selector: Selector,
    },
}

/// Where a hidden result's marker goes, and how the marker finds it again.
///
/// `InsertBefore` pairs with "next element sibling of the marker";
/// `PrependToParent` pairs with "first result under the marker's parent".
/// Both lookups also require the marker's pairing token on the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPlacement {
    /// First child of the result's parent.
    PrependToParent,
    /// Immediately before the result.
    InsertBefore,
}

/// One provider's DOM conventions. Immutable once selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Display name.
    pub name: String,
    /// Identity.
    pub kind: ProviderKind,
    /// Result locator.
    pub results: ResultLocator,
    /// Link strategy.
    pub link: LinkStrategy,
    /// Marker placement.
    pub placement: MarkerPlacement,
    /// Root of the dynamically replaced result list, for the mutation watcher.
    #[serde(default)]
    pub watch_root: Option<Selector>,
}

impl ProviderDescriptor {
    /// The descriptor used when no provider matches.
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            name: "Unknown".to_string(),
            kind: ProviderKind::Unsupported,
            results: ResultLocator::None,
            link: LinkStrategy::None,
            placement: MarkerPlacement::InsertBefore,
            watch_root: None,
        }
    }

    /// Whether this descriptor can ever find results.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self.results, ResultLocator::None)
    }

    /// Every result on the page, hidden or not, in document order.
    pub fn all_results<D: Dom>(&self, dom: &D) -> Vec<D::Node> {
        self.results_within(dom, &dom.root())
    }

    /// Results not marked hidden, in document order.
    pub fn enumerate_results<D: Dom>(&self, dom: &D, hidden_class: &str) -> Vec<D::Node> {
        self.all_results(dom)
            .into_iter()
            .filter(|node| !dom.has_class(node, hidden_class))
            .collect()
    }

    /// Results currently marked hidden, in document order.
    pub fn hidden_results<D: Dom>(&self, dom: &D, hidden_class: &str) -> Vec<D::Node> {
        self.all_results(dom)
            .into_iter()
            .filter(|node| dom.has_class(node, hidden_class))
            .collect()
    }

    /// Results under `scope`.
    pub fn results_within<D: Dom>(&self, dom: &D, scope: &D::Node) -> Vec<D::Node> {
        match self.results {
            ResultLocator::None => Vec::new(),
            ResultLocator::Matching { ref selector } => dom.query_all(scope, selector),
            ResultLocator::AncestorOf {
                ref child,
                ref ancestor,
            } => {
                let mut found: Vec<D::Node> = Vec::new();
                for inner in dom.query_all(scope, child) {
                    if let Some(result) = dom.closest(&inner, ancestor) {
                        if !found.contains(&result) {
                            found.push(result);
                        }
                    }
                }
                found
            }
        }
    }

    /// Whether `node` is a result element.
    pub fn is_result<D: Dom>(&self, dom: &D, node: &D::Node) -> bool {
        match self.results {
            ResultLocator::None => false,
            ResultLocator::Matching { ref selector } => dom.matches(node, selector),
            ResultLocator::AncestorOf {
                ref child,
                ref ancestor,
            } => dom.matches(node, ancestor) && dom.query(node, child).is_some(),
        }
    }

    /// The result containing `node`, `node` included.
    pub fn result_containing<D: Dom>(&self, dom: &D, node: &D::Node) -> Option<D::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.is_result(dom, &candidate) {
                return Some(candidate);
            }
            current = dom.parent(&candidate);
        }
        None
    }

    /// The result's outbound link, or an empty string when it has none.
    pub fn extract_link<D: Dom>(&self, dom: &D, result: &D::Node) -> String {
        let found = match self.link {
            LinkStrategy::None => None,
            LinkStrategy::FirstAnchor => dom.first_link(result).and_then(|a| dom.link_href(&a)),
            LinkStrategy::Anchor { ref selector } => {
                dom.query(result, selector).and_then(|a| dom.link_href(&a))
            }
            LinkStrategy::DisplayedText { ref selector } => dom
                .query(result, selector)
                .map(|node| dom.text_content(&node).trim().to_string()),
        };
        found.unwrap_or_default()
    }

    /// Canonical hostname of the result's link.
    pub fn result_host<D: Dom>(&self, dom: &D, result: &D::Node) -> Option<String> {
        let link = self.extract_link(dom, result);
        if link.is_empty() {
            return None;
        }
        match self.link {
            LinkStrategy::DisplayedText { .. } => hostname_from_display_text(&link),
            _ => canonical_hostname(&link),
        }
    }

    /// The node a marker for `result` is inserted into, with the placement.
    pub fn marker_anchor<D: Dom>(&self, dom: &D, result: &D::Node) -> Option<(D::Node, MarkerPlacement)> {
        dom.parent(result).map(|parent| (parent, self.placement))
    }

    /// Inverse of [`marker_anchor`](Self::marker_anchor): the result a marker stands for.
    pub fn result_from_marker<D: Dom>(&self, dom: &D, marker: &D::Node) -> Option<D::Node> {
        let token = dom.attribute(marker, PAIR_ATTRIBUTE)?;
        let paired = |node: &D::Node| dom.attribute(node, PAIR_ATTRIBUTE).as_deref() == Some(token.as_str());
        match self.placement {
            MarkerPlacement::InsertBefore => dom
                .next_element_sibling(marker)
                .filter(|node| self.is_result(dom, node) && paired(node)),
            MarkerPlacement::PrependToParent => {
                let parent = dom.parent(marker)?;
                self.results_within(dom, &parent).into_iter().find(|node| paired(node))
            }
        }
    }
}

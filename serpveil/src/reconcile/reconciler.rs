//! One reconciliation pass over the current results.

use serde::Serialize;
use serde_json::json;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ClassNames;
use crate::dom::{Dom, Selector};
use crate::errors::{DomError, SelectorParseError};
use crate::events::{self, EventSink};
use crate::i18n::Labels;
use crate::provider::{MarkerPlacement, ProviderDescriptor, HOST_ATTRIBUTE, PAIR_ATTRIBUTE};
use crate::settings::HiddenSiteSet;

/// Classification of a result element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    /// Collapsed behind a marker.
    Hidden,
    /// Revealed by the user; not re-hidden while its host stays listed.
    Unhidden,
    /// Visible and classified.
    Shown,
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Result elements looked at, hidden ones included.
    pub examined: usize,
    /// Results newly hidden.
    pub hidden: usize,
    /// Hidden results restored because their host left the list.
    pub reversed: usize,
    /// Results newly flagged shown.
    pub shown: usize,
    /// Hide controls added.
    pub controls_added: usize,
    /// Markers removed because their result is gone.
    pub orphans_removed: usize,
    /// Results skipped for having no usable link.
    pub skipped: usize,
    /// Results left unchanged after a DOM write failed.
    pub failed: usize,
}

impl ReconcileReport {
    /// Whether the pass changed the page.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.hidden + self.reversed + self.shown + self.controls_added + self.orphans_removed > 0
    }
}

/// Applies the hidden-site list to the page through a provider descriptor.
///
/// The reconciler owns no page state; everything it knows about a result is
/// read back from the result's class flags and pairing attribute, so a pass
/// over an already reconciled page performs no writes.
pub struct Reconciler {
    provider: Arc<ProviderDescriptor>,
    classes: ClassNames,
    labels: Labels,
    events: Arc<dyn EventSink>,
    marker_selector: Selector,
    control_selector: Selector,
    next_pair: Cell<u64>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("provider", &self.provider.name)
            .field("classes", &self.classes)
            .field("next_pair", &self.next_pair.get())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler for one page.
    ///
    /// Fails when the marker or control class is not a valid class name.
    pub fn new(
        provider: Arc<ProviderDescriptor>,
        classes: ClassNames,
        labels: Labels,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, SelectorParseError> {
        let marker_selector = Selector::class(&classes.marker)?;
        let control_selector = Selector::class(&classes.control)?;
        Ok(Self {
            provider,
            classes,
            labels,
            events,
            marker_selector,
            control_selector,
            next_pair: Cell::new(0),
        })
    }

    /// The provider this reconciler works through.
    #[must_use]
    pub fn provider(&self) -> &ProviderDescriptor {
        &self.provider
    }

    /// Class names written by this reconciler.
    #[must_use]
    pub fn classes(&self) -> &ClassNames {
        &self.classes
    }

    /// Reads a result's classification back from its flags.
    pub fn state<D: Dom>(&self, dom: &D, result: &D::Node) -> Option<ResultState> {
        if dom.has_class(result, &self.classes.hidden) {
            Some(ResultState::Hidden)
        } else if dom.has_class(result, &self.classes.unhidden) {
            Some(ResultState::Unhidden)
        } else if dom.has_class(result, &self.classes.shown) {
            Some(ResultState::Shown)
        } else {
            None
        }
    }

    /// Runs one pass.
    ///
    /// Order: restore hidden results whose host is no longer listed, remove
    /// orphaned markers, then classify every result not flagged hidden. DOM
    /// failures on one result are logged and the pass moves on.
    pub fn reconcile<D: Dom>(&self, dom: &D, sites: &HiddenSiteSet) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for result in self.provider.hidden_results(dom, &self.classes.hidden) {
            report.examined += 1;
            let host = self.provider.result_host(dom, &result);
            if host.as_deref().is_some_and(|h| sites.contains(h)) {
                continue;
            }
            let restored = match host {
                Some(_) => self.restore(dom, &result, &mut report),
                None => self.release(dom, &result),
            };
            match restored {
                Ok(()) => {
                    report.reversed += 1;
                    self.events.emit(events::RESULT_REVERSED, Some(json!({ "host": host })));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to restore result");
                    report.failed += 1;
                }
            }
        }

        report.orphans_removed = self.remove_orphan_markers(dom);

        for result in self.provider.enumerate_results(dom, &self.classes.hidden) {
            report.examined += 1;
            let Some(host) = self.provider.result_host(dom, &result) else {
                report.skipped += 1;
                continue;
            };
            let outcome = if sites.contains(&host) && !dom.has_class(&result, &self.classes.unhidden) {
                self.hide(dom, &result, &host).map(|()| {
                    report.hidden += 1;
                    self.events.emit(events::RESULT_HIDDEN, Some(json!({ "host": host })));
                })
            } else {
                self.ensure_visible(dom, &result, &mut report)
            };
            if let Err(e) = outcome {
                warn!(error = %e, host = %host, "Failed to reconcile result");
                report.failed += 1;
            }
        }

        debug!(provider = %self.provider.name, ?report, "Reconcile pass finished");
        report
    }

    /// Reveals the result behind `marker`, removing the marker.
    ///
    /// Returns the revealed result, or `None` when the marker no longer
    /// pairs with one (the marker is removed either way).
    pub fn reveal<D: Dom>(&self, dom: &D, marker: &D::Node) -> Option<D::Node> {
        let result = self.provider.result_from_marker(dom, marker);
        if let Err(e) = dom.remove(marker) {
            warn!(error = %e, "Failed to remove marker");
        }
        let result = result?;
        if let Err(e) = self.mark_unhidden(dom, &result) {
            warn!(error = %e, "Failed to reveal result");
        }
        let host = self.provider.result_host(dom, &result);
        self.events.emit(events::RESULT_REVEALED, Some(json!({ "host": host })));
        Some(result)
    }

    /// The canonical host of the result holding a hide control.
    pub fn host_for_control<D: Dom>(&self, dom: &D, control: &D::Node) -> Option<String> {
        let result = self.provider.result_containing(dom, control)?;
        self.provider.result_host(dom, &result)
    }

    /// The marker `node` belongs to, `node` included.
    pub fn marker_at<D: Dom>(&self, dom: &D, node: &D::Node) -> Option<D::Node> {
        dom.closest(node, &self.marker_selector)
    }

    /// The hide control `node` belongs to, `node` included.
    pub fn control_at<D: Dom>(&self, dom: &D, node: &D::Node) -> Option<D::Node> {
        dom.closest(node, &self.control_selector)
    }

    /// Hides a result the user revealed earlier, clearing its unhidden flag.
    pub fn rehide<D: Dom>(&self, dom: &D, result: &D::Node, host: &str) -> Result<(), DomError> {
        dom.remove_class(result, &self.classes.unhidden)?;
        self.hide(dom, result, host)?;
        self.events.emit(events::RESULT_HIDDEN, Some(json!({ "host": host })));
        Ok(())
    }

    fn hide<D: Dom>(&self, dom: &D, result: &D::Node, host: &str) -> Result<(), DomError> {
        let (parent, placement) = self
            .provider
            .marker_anchor(dom, result)
            .ok_or_else(|| DomError::new("hide", "result has no parent element"))?;
        let token = self.next_token();
        let marker = self.build_marker(dom, host, &token)?;
        dom.set_attribute(result, PAIR_ATTRIBUTE, &token)?;
        match placement {
            MarkerPlacement::PrependToParent => dom.prepend_child(&parent, &marker)?,
            MarkerPlacement::InsertBefore => dom.insert_before(&parent, &marker, result)?,
        }
        if dom.has_class(result, &self.classes.shown) {
            dom.remove_class(result, &self.classes.shown)?;
        }
        dom.add_class(result, &self.classes.hidden)
    }

    fn mark_unhidden<D: Dom>(&self, dom: &D, result: &D::Node) -> Result<(), DomError> {
        dom.remove_class(result, &self.classes.hidden)?;
        if dom.has_class(result, &self.classes.shown) {
            dom.remove_class(result, &self.classes.shown)?;
        }
        dom.add_class(result, &self.classes.unhidden)?;
        self.ensure_control(dom, result)?;
        Ok(())
    }

    fn restore<D: Dom>(&self, dom: &D, result: &D::Node, report: &mut ReconcileReport) -> Result<(), DomError> {
        for marker in self.markers_for(dom, result) {
            dom.remove(&marker)?;
        }
        dom.remove_class(result, &self.classes.hidden)?;
        self.ensure_visible(dom, result, report)
    }

    /// Drops the marker and hidden flag of a result whose link is gone,
    /// leaving it unclassified.
    fn release<D: Dom>(&self, dom: &D, result: &D::Node) -> Result<(), DomError> {
        for marker in self.markers_for(dom, result) {
            dom.remove(&marker)?;
        }
        dom.remove_class(result, &self.classes.hidden)
    }

    fn ensure_visible<D: Dom>(&self, dom: &D, result: &D::Node, report: &mut ReconcileReport) -> Result<(), DomError> {
        if !dom.has_class(result, &self.classes.unhidden) && !dom.has_class(result, &self.classes.shown) {
            dom.add_class(result, &self.classes.shown)?;
            report.shown += 1;
        }
        if self.ensure_control(dom, result)? {
            report.controls_added += 1;
        }
        Ok(())
    }

    /// Adds a hide control unless the result already has one.
    fn ensure_control<D: Dom>(&self, dom: &D, result: &D::Node) -> Result<bool, DomError> {
        if dom.query(result, &self.control_selector).is_some() {
            return Ok(false);
        }
        let control = dom.create_element("span")?;
        dom.add_class(&control, &self.classes.control)?;
        dom.set_attribute(&control, "role", "button")?;
        dom.set_attribute(&control, "title", &self.labels.hide_result_title)?;
        dom.set_text_content(&control, &self.labels.hide_result)?;
        dom.append_child(result, &control)?;
        Ok(true)
    }

    fn build_marker<D: Dom>(&self, dom: &D, host: &str, token: &str) -> Result<D::Node, DomError> {
        let marker = dom.create_element("div")?;
        dom.add_class(&marker, &self.classes.marker)?;
        dom.set_attribute(&marker, PAIR_ATTRIBUTE, token)?;
        dom.set_attribute(&marker, HOST_ATTRIBUTE, host)?;
        dom.set_attribute(&marker, "role", "button")?;

        let label = dom.create_element("span")?;
        dom.set_text_content(&label, &format!("{} ", self.labels.result_hidden))?;
        dom.append_child(&marker, &label)?;

        let host_label = dom.create_element("span")?;
        dom.add_class(&host_label, &self.classes.marker_host)?;
        dom.set_text_content(&host_label, host)?;
        dom.append_child(&marker, &host_label)?;
        Ok(marker)
    }

    fn markers_for<D: Dom>(&self, dom: &D, result: &D::Node) -> Vec<D::Node> {
        let Some(token) = dom.attribute(result, PAIR_ATTRIBUTE) else {
            return Vec::new();
        };
        dom.query_all(&dom.root(), &self.marker_selector)
            .into_iter()
            .filter(|marker| dom.attribute(marker, PAIR_ATTRIBUTE).as_deref() == Some(token.as_str()))
            .collect()
    }

    fn remove_orphan_markers<D: Dom>(&self, dom: &D) -> usize {
        let mut removed = 0;
        for marker in dom.query_all(&dom.root(), &self.marker_selector) {
            let paired = self
                .provider
                .result_from_marker(dom, &marker)
                .is_some_and(|result| dom.has_class(&result, &self.classes.hidden));
            if paired {
                continue;
            }
            match dom.remove(&marker) {
                Ok(()) => removed += 1,
                Err(e) => warn!(error = %e, "Failed to remove orphaned marker"),
            }
        }
        removed
    }

    fn next_token(&self) -> String {
        let id = self.next_pair.get() + 1;
        self.next_pair.set(id);
        format!("sv{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::events::CollectingEventSink;
    use crate::provider::ProviderRegistry;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;

    fn reconciler_for(host: &str) -> (Reconciler, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let reconciler = Reconciler::new(
            ProviderRegistry::builtin().select_provider(host),
            ClassNames::default(),
            Labels::default(),
            sink.clone(),
        )
        .unwrap();
        (reconciler, sink)
    }

    fn sites(hosts: &[&str]) -> HiddenSiteSet {
        hosts.iter().copied().collect()
    }

    #[test]
    fn test_hides_listed_and_shows_the_rest() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, sink) = reconciler_for("duckduckgo.com");

        let report = reconciler.reconcile(&doc, &sites(&["spam.example"]));
        assert_eq!(report.hidden, 1);
        assert_eq!(report.shown, 2);
        assert_eq!(report.controls_added, 2);
        assert_eq!(sink.events_of_type("result.hidden").len(), 1);

        let results = reconciler.provider().all_results(&doc);
        let states: Vec<_> = results.iter().map(|r| reconciler.state(&doc, r)).collect();
        assert_eq!(
            states,
            vec![Some(ResultState::Shown), Some(ResultState::Hidden), Some(ResultState::Shown)]
        );
    }

    #[test]
    fn test_marker_placement_prepend() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, _) = reconciler_for("duckduckgo.com");
        reconciler.reconcile(&doc, &sites(&["spam.example"]));

        let hidden = reconciler.provider().hidden_results(&doc, "serpveil-hidden")[0];
        let parent = doc.parent(&hidden).unwrap();
        let first = doc.element_children(parent)[0];
        assert!(doc.has_class(&first, "serpveil-marker"));
        assert_eq!(doc.attribute(&first, HOST_ATTRIBUTE).as_deref(), Some("spam.example"));
        assert_eq!(doc.text_content(&first), "Result hidden from spam.example");
        assert_eq!(reconciler.provider().result_from_marker(&doc, &first), Some(hidden));
    }

    #[test]
    fn test_marker_placement_insert_before() {
        let doc = MemoryDocument::parse(fixtures::GOOGLE, Some(fixtures::GOOGLE_URL));
        let (reconciler, _) = reconciler_for("www.google.com");
        let report = reconciler.reconcile(&doc, &sites(&["spam.example"]));
        assert_eq!(report.hidden, 1);

        let hidden = reconciler.provider().hidden_results(&doc, "serpveil-hidden")[0];
        let marker = doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).unwrap();
        assert_eq!(doc.next_element_sibling(&marker), Some(hidden));
    }

    #[test]
    fn test_second_pass_writes_nothing() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, _) = reconciler_for("duckduckgo.com");
        let set = sites(&["spam.example"]);
        reconciler.reconcile(&doc, &set);

        let writes = doc.write_count();
        let report = reconciler.reconcile(&doc, &set);
        assert!(!report.changed());
        assert_eq!(doc.write_count(), writes);
        assert_eq!(doc.query_all(&doc.root(), &Selector::class("serpveil-marker").unwrap()).len(), 1);
    }

    #[test]
    fn test_unlisting_restores_result() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, sink) = reconciler_for("duckduckgo.com");
        reconciler.reconcile(&doc, &sites(&["spam.example"]));

        let report = reconciler.reconcile(&doc, &HiddenSiteSet::new());
        assert_eq!(report.reversed, 1);
        assert!(doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).is_none());
        let results = reconciler.provider().all_results(&doc);
        assert!(results
            .iter()
            .all(|r| reconciler.state(&doc, r) == Some(ResultState::Shown)));
        assert_eq!(doc.query_all(&doc.root(), &Selector::class("serpveil-control").unwrap()).len(), 3);
        assert_eq!(sink.events_of_type("result.reversed").len(), 1);
    }

    #[test]
    fn test_reveal_is_sticky() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, _) = reconciler_for("duckduckgo.com");
        let set = sites(&["spam.example"]);
        reconciler.reconcile(&doc, &set);

        let marker = doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).unwrap();
        let revealed = reconciler.reveal(&doc, &marker).unwrap();
        assert_eq!(reconciler.state(&doc, &revealed), Some(ResultState::Unhidden));
        assert!(!doc.is_connected(marker));

        let report = reconciler.reconcile(&doc, &set);
        assert_eq!(report.hidden, 0);
        assert_eq!(reconciler.state(&doc, &revealed), Some(ResultState::Unhidden));
    }

    #[test]
    fn test_results_without_links_are_skipped() {
        let doc = MemoryDocument::parse(fixtures::BING, Some(fixtures::BING_URL));
        let (reconciler, _) = reconciler_for("www.bing.com");
        let report = reconciler.reconcile(&doc, &sites(&["spam.example"]));
        assert_eq!(report.skipped, 1);
        let unlinked = reconciler.provider().all_results(&doc)[2];
        assert_eq!(reconciler.state(&doc, &unlinked), None);
    }

    #[test]
    fn test_orphan_marker_removed() {
        let doc = MemoryDocument::parse(fixtures::GOOGLE, Some(fixtures::GOOGLE_URL));
        let (reconciler, _) = reconciler_for("www.google.com");
        let set = sites(&["spam.example"]);
        reconciler.reconcile(&doc, &set);

        let hidden = reconciler.provider().hidden_results(&doc, "serpveil-hidden")[0];
        doc.remove(&hidden).unwrap();
        let report = reconciler.reconcile(&doc, &set);
        assert_eq!(report.orphans_removed, 1);
        assert!(doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).is_none());
    }

    #[test]
    fn test_host_for_control() {
        let doc = MemoryDocument::parse(fixtures::STARTPAGE, Some(fixtures::STARTPAGE_URL));
        let (reconciler, _) = reconciler_for("www.startpage.com");
        reconciler.reconcile(&doc, &HiddenSiteSet::new());

        let control = doc.query(&doc.root(), &Selector::class("serpveil-control").unwrap()).unwrap();
        assert_eq!(reconciler.control_at(&doc, &control), Some(control));
        assert_eq!(reconciler.host_for_control(&doc, &control).as_deref(), Some("docs.rs"));
    }

    #[test]
    fn test_hidden_result_losing_its_link_is_released() {
        let doc = MemoryDocument::parse(fixtures::BING, Some(fixtures::BING_URL));
        let (reconciler, _) = reconciler_for("www.bing.com");
        let set = sites(&["spam.example"]);
        reconciler.reconcile(&doc, &set);

        let hidden = reconciler.provider().hidden_results(&doc, "serpveil-hidden")[0];
        let anchor = doc.first_link(&hidden).unwrap();
        doc.remove(&anchor).unwrap();

        let report = reconciler.reconcile(&doc, &set);
        assert_eq!(report.reversed, 1);
        assert_eq!(report.controls_added, 0);
        assert_eq!(reconciler.state(&doc, &hidden), None);
        assert!(doc.query(&hidden, &Selector::class("serpveil-control").unwrap()).is_none());
        assert!(doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).is_none());
    }

    #[test]
    fn test_rehide_clears_unhidden_flag() {
        let doc = MemoryDocument::parse(fixtures::DUCKDUCKGO, Some(fixtures::DUCKDUCKGO_URL));
        let (reconciler, sink) = reconciler_for("duckduckgo.com");
        let set = sites(&["spam.example"]);
        reconciler.reconcile(&doc, &set);

        let marker = doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).unwrap();
        let revealed = reconciler.reveal(&doc, &marker).unwrap();
        reconciler.rehide(&doc, &revealed, "spam.example").unwrap();
        assert_eq!(reconciler.state(&doc, &revealed), Some(ResultState::Hidden));
        assert_eq!(sink.events_of_type("result.hidden").len(), 2);

        let marker = doc.query(&doc.root(), &Selector::class("serpveil-marker").unwrap()).unwrap();
        assert_eq!(reconciler.provider().result_from_marker(&doc, &marker), Some(revealed));
        assert!(!reconciler.reconcile(&doc, &set).changed());
    }

    #[test]
    fn test_new_rejects_invalid_class_names() {
        let classes = ClassNames {
            marker: "1bad".to_string(),
            ..ClassNames::default()
        };
        let result = Reconciler::new(
            ProviderRegistry::builtin().select_provider("duckduckgo.com"),
            classes,
            Labels::default(),
            Arc::new(CollectingEventSink::new()),
        );
        assert!(result.is_err());
    }
}

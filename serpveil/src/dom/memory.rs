//! In-memory document over a mutable [`scraper::Html`] tree.
//!
//! Used by tests, benches and native tools. Selector matching goes through
//! scraper, so it follows the same CSS rules a browser applies. Mutation
//! notifications are delivered synchronously, after the tree borrow is
//! released, and only for child-list changes (like a browser observer
//! configured with `childList` and `subtree`). Every write, observed or not,
//! bumps [`MemoryDocument::write_count`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ego_tree::{NodeRef, Tree};
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{CaseSensitivity, ElementRef, Html, Node, StrTendril};
use url::Url;

use super::selector::Selector;
use super::{Dom, MutationCallback, MutationObserverHandle, ObserveMutations};
use crate::errors::DomError;

/// Handle to a node inside a [`MemoryDocument`].
pub type NodeId = ego_tree::NodeId;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

struct ObserverEntry {
    id: u64,
    root: NodeId,
    callback: MutationCallback,
}

type ObserverList = Rc<RefCell<Vec<ObserverEntry>>>;

type AttributeList = Vec<(QualName, StrTendril)>;

#[derive(Clone, Copy)]
enum Position {
    First,
    Last,
    Before(NodeId),
}

/// A mutable document held entirely in memory.
pub struct MemoryDocument {
    html: RefCell<Html>,
    base_url: Option<Url>,
    observers: ObserverList,
    next_observer: Cell<u64>,
    writes: Cell<usize>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("nodes", &self.html.borrow().tree.values().count())
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("observers", &self.observers.borrow().len())
            .field("writes", &self.writes.get())
            .finish()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryDocument {
    /// Creates an empty document. Relative `href`s resolve against `base_url`.
    #[must_use]
    pub fn new(base_url: Option<&str>) -> Self {
        Self::from_html(Html::new_document(), base_url)
    }

    /// Parses an HTML document.
    #[must_use]
    pub fn parse(html: &str, base_url: Option<&str>) -> Self {
        Self::from_html(Html::parse_document(html), base_url)
    }

    /// Wraps an already parsed document.
    #[must_use]
    pub fn from_html(html: Html, base_url: Option<&str>) -> Self {
        Self {
            html: RefCell::new(html),
            base_url: base_url.and_then(|u| Url::parse(u).ok()),
            observers: Rc::new(RefCell::new(Vec::new())),
            next_observer: Cell::new(0),
            writes: Cell::new(0),
        }
    }

    /// Parses `fragment` and appends its nodes to `parent`, as a page
    /// script would when it renders more results.
    pub fn append_html(&self, parent: NodeId, fragment: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(fragment);
        let added: Vec<NodeId> = {
            let mut html = self.html.borrow_mut();
            parsed
                .root_element()
                .children()
                .filter_map(|child| graft(&mut html.tree, child, parent))
                .collect()
        };
        self.record_write(parent, true);
        added
    }

    /// Number of writes performed through the [`Dom`] trait so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Lowercase tag name of an element.
    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        let html = self.html.borrow();
        element(&html.tree, node).map(|e| e.value().name().to_ascii_lowercase())
    }

    /// Element children of `node`.
    #[must_use]
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let html = self.html.borrow();
        html.tree
            .get(node)
            .map(|n| n.children().filter(|c| c.value().is_element()).map(|c| c.id()).collect())
            .unwrap_or_default()
    }

    /// Whether `node` is attached to the document.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        let html = self.html.borrow();
        is_inclusive_ancestor(&html.tree, html.tree.root().id(), node)
    }

    /// Renders the document, for debugging failed assertions.
    #[must_use]
    pub fn html(&self) -> String {
        self.html.borrow().html()
    }

    fn record_write(&self, node: NodeId, child_list: bool) {
        self.writes.set(self.writes.get() + 1);
        if !child_list {
            return;
        }
        let callbacks: Vec<MutationCallback> = {
            let html = self.html.borrow();
            self.observers
                .borrow()
                .iter()
                .filter(|entry| is_inclusive_ancestor(&html.tree, entry.root, node))
                .map(|entry| Rc::clone(&entry.callback))
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Rebuilds an element with edited attributes.
    fn edit_attributes<T>(
        &self,
        node: NodeId,
        operation: &'static str,
        edit: impl FnOnce(&mut AttributeList) -> T,
    ) -> Result<T, DomError> {
        let mut html = self.html.borrow_mut();
        let mut target = html
            .tree
            .get_mut(node)
            .ok_or_else(|| DomError::new(operation, format!("{node:?} does not exist")))?;
        let (rebuilt, out) = match target.value() {
            Node::Element(element) => {
                let mut attributes: AttributeList = element
                    .attrs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                let out = edit(&mut attributes);
                let attributes = attributes
                    .into_iter()
                    .map(|(name, value)| Attribute { name, value })
                    .collect();
                (Element::new(element.name.clone(), attributes), out)
            }
            _ => return Err(DomError::new(operation, format!("{node:?} is not an element"))),
        };
        *target.value() = Node::Element(rebuilt);
        Ok(out)
    }

    fn insert(
        &self,
        parent: NodeId,
        child: NodeId,
        position: Position,
        operation: &'static str,
    ) -> Result<(), DomError> {
        let old_parent = {
            let mut html = self.html.borrow_mut();
            let tree = &mut html.tree;
            let accepts_children = tree
                .get(parent)
                .is_some_and(|p| p.value().is_element() || p.value().is_document());
            if !accepts_children {
                return Err(DomError::new(operation, format!("{parent:?} cannot have children")));
            }
            if tree.get(child).is_none() {
                return Err(DomError::new(operation, format!("{child:?} does not exist")));
            }
            if is_inclusive_ancestor(tree, child, parent) {
                return Err(DomError::new(operation, "would create a cycle"));
            }
            if let Position::Before(reference) = position {
                let under_parent = tree
                    .get(reference)
                    .and_then(|r| r.parent())
                    .is_some_and(|p| p.id() == parent);
                if reference == child || !under_parent {
                    return Err(DomError::new(operation, "reference node is not a child of parent"));
                }
            }

            let old_parent = tree.get(child).and_then(|c| c.parent()).map(|p| p.id());
            if let Some(mut node) = tree.get_mut(child) {
                node.detach();
            }
            let anchor = match position {
                Position::Before(reference) => reference,
                Position::First | Position::Last => parent,
            };
            let mut anchor = tree
                .get_mut(anchor)
                .ok_or_else(|| DomError::new(operation, format!("{anchor:?} does not exist")))?;
            match position {
                Position::First => anchor.prepend_id(child),
                Position::Last => anchor.append_id(child),
                Position::Before(_) => anchor.insert_id_before(child),
            };
            old_parent
        };
        if let Some(old_parent) = old_parent {
            self.record_write(old_parent, true);
        }
        self.record_write(parent, true);
        Ok(())
    }
}

fn element(tree: &Tree<Node>, node: NodeId) -> Option<ElementRef<'_>> {
    tree.get(node).and_then(ElementRef::wrap)
}

fn is_inclusive_ancestor(tree: &Tree<Node>, ancestor: NodeId, node: NodeId) -> bool {
    node == ancestor
        || tree
            .get(node)
            .is_some_and(|n| n.ancestors().any(|a| a.id() == ancestor))
}

fn attribute_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

fn set_in(attributes: &mut AttributeList, name: &str, value: &str) {
    let value = StrTendril::from_slice(value);
    match attributes.iter_mut().find(|(key, _)| &*key.local == name) {
        Some(slot) => slot.1 = value,
        None => attributes.push((attribute_name(name), value)),
    }
}

fn edit_classes(attributes: &mut AttributeList, edit: impl FnOnce(&mut Vec<String>)) {
    let mut classes: Vec<String> = attributes
        .iter()
        .find(|(key, _)| &*key.local == "class")
        .map(|(_, value)| value.split_whitespace().map(String::from).collect())
        .unwrap_or_default();
    edit(&mut classes);
    set_in(attributes, "class", &classes.join(" "));
}

/// Copies `source` and its subtree under `parent`.
fn graft(tree: &mut Tree<Node>, source: NodeRef<'_, Node>, parent: NodeId) -> Option<NodeId> {
    let id = tree.orphan(source.value().clone()).id();
    tree.get_mut(parent)?.append_id(id);
    for child in source.children() {
        graft(tree, child, id);
    }
    Some(id)
}

impl Dom for MemoryDocument {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.html.borrow().tree.root().id()
    }

    fn query_all(&self, scope: &NodeId, selector: &Selector) -> Vec<NodeId> {
        let html = self.html.borrow();
        let Some(scope) = html.tree.get(*scope) else {
            return Vec::new();
        };
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|e| selector.matches(e))
            .map(|e| e.id())
            .collect()
    }

    fn matches(&self, node: &NodeId, selector: &Selector) -> bool {
        let html = self.html.borrow();
        element(&html.tree, *node).is_some_and(|e| selector.matches(&e))
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        let html = self.html.borrow();
        html.tree
            .get(*node)?
            .parent()
            .filter(|p| p.value().is_element())
            .map(|p| p.id())
    }

    fn next_element_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let html = self.html.borrow();
        html.tree
            .get(*node)?
            .next_siblings()
            .find(|s| s.value().is_element())
            .map(|s| s.id())
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        let html = self.html.borrow();
        element(&html.tree, *node)
            .is_some_and(|e| e.value().has_class(class, CaseSensitivity::CaseSensitive))
    }

    fn add_class(&self, node: &NodeId, class: &str) -> Result<(), DomError> {
        self.edit_attributes(*node, "add_class", |attributes| {
            edit_classes(attributes, |classes| {
                if !classes.iter().any(|c| c == class) {
                    classes.push(class.to_string());
                }
            });
        })?;
        self.record_write(*node, false);
        Ok(())
    }

    fn remove_class(&self, node: &NodeId, class: &str) -> Result<(), DomError> {
        self.edit_attributes(*node, "remove_class", |attributes| {
            edit_classes(attributes, |classes| classes.retain(|c| c != class));
        })?;
        self.record_write(*node, false);
        Ok(())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        let html = self.html.borrow();
        element(&html.tree, *node).and_then(|e| e.value().attr(name).map(String::from))
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.edit_attributes(*node, "set_attribute", |attributes| set_in(attributes, name, value))?;
        self.record_write(*node, false);
        Ok(())
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) -> Result<(), DomError> {
        self.edit_attributes(*node, "remove_attribute", |attributes| {
            attributes.retain(|(key, _)| &*key.local != name);
        })?;
        self.record_write(*node, false);
        Ok(())
    }

    fn text_content(&self, node: &NodeId) -> String {
        let html = self.html.borrow();
        html.tree
            .get(*node)
            .map(|n| {
                n.descendants()
                    .filter_map(|d| d.value().as_text())
                    .map(|t| &**t)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_text_content(&self, node: &NodeId, text: &str) -> Result<(), DomError> {
        {
            let mut html = self.html.borrow_mut();
            let children: Vec<NodeId> = match element(&html.tree, *node) {
                Some(e) => e.children().map(|c| c.id()).collect(),
                None => {
                    return Err(DomError::new("set_text_content", format!("{node:?} is not an element")));
                }
            };
            for child in children {
                if let Some(mut child) = html.tree.get_mut(child) {
                    child.detach();
                }
            }
            if let Some(mut target) = html.tree.get_mut(*node) {
                target.append(Node::Text(Text {
                    text: StrTendril::from_slice(text),
                }));
            }
        }
        self.record_write(*node, true);
        Ok(())
    }

    fn link_href(&self, node: &NodeId) -> Option<String> {
        let href = self.attribute(node, "href")?;
        let resolved = match self.base_url {
            Some(ref base) => base.join(&href),
            None => Url::parse(&href),
        };
        resolved.ok().map(String::from)
    }

    fn first_link(&self, scope: &NodeId) -> Option<NodeId> {
        let html = self.html.borrow();
        html.tree
            .get(*scope)?
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name().eq_ignore_ascii_case("a") && e.value().attr("href").is_some())
            .map(|e| e.id())
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        if tag.is_empty() {
            return Err(DomError::new("create_element", "empty tag name"));
        }
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag.to_ascii_lowercase()),
        );
        let mut html = self.html.borrow_mut();
        Ok(html.tree.orphan(Node::Element(Element::new(name, Vec::new()))).id())
    }

    fn prepend_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        self.insert(*parent, *child, Position::First, "prepend_child")
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        self.insert(*parent, *child, Position::Last, "append_child")
    }

    fn insert_before(
        &self,
        parent: &NodeId,
        child: &NodeId,
        reference: &NodeId,
    ) -> Result<(), DomError> {
        self.insert(*parent, *child, Position::Before(*reference), "insert_before")
    }

    fn remove(&self, node: &NodeId) -> Result<(), DomError> {
        let parent = {
            let mut html = self.html.borrow_mut();
            let parent = html.tree.get(*node).and_then(|n| n.parent()).map(|p| p.id());
            if parent.is_some() {
                if let Some(mut target) = html.tree.get_mut(*node) {
                    target.detach();
                }
            }
            parent
        };
        match parent {
            Some(parent) => {
                self.record_write(parent, true);
                Ok(())
            }
            None => Err(DomError::new("remove", format!("{node:?} is already detached"))),
        }
    }
}

/// Subscription handle returned by [`MemoryDocument::observe`].
pub struct MemoryObserver {
    id: u64,
    observers: Weak<RefCell<Vec<ObserverEntry>>>,
}

impl fmt::Debug for MemoryObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryObserver").field("id", &self.id).finish()
    }
}

impl MutationObserverHandle for MemoryObserver {
    fn disconnect(&self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.borrow_mut().retain(|entry| entry.id != self.id);
        }
    }

    fn discard_pending(&self) {
        // Delivery is synchronous; nothing is ever queued.
    }
}

impl ObserveMutations for MemoryDocument {
    type Observer = MemoryObserver;

    fn observe(&self, root: &NodeId, callback: MutationCallback) -> Result<MemoryObserver, DomError> {
        let id = self.next_observer.get();
        self.next_observer.set(id + 1);
        self.observers.borrow_mut().push(ObserverEntry {
            id,
            root: *root,
            callback,
        });
        Ok(MemoryObserver {
            id,
            observers: Rc::downgrade(&self.observers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    const PAGE: &str = r#"
        <html><body>
          <ol id="results">
            <li class="item first"><a href="/one">One</a></li>
            <li class="item"><span>Two</span><a href="https://two.example/x?y=1">Two</a></li>
          </ol>
        </body></html>"#;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_query_in_document_order() {
        let doc = MemoryDocument::parse(PAGE, Some("https://search.example/q"));
        let items = doc.query_all(&doc.root(), &sel("#results > li.item"));
        assert_eq!(items.len(), 2);
        assert!(doc.has_class(&items[0], "first"));
        assert_eq!(doc.text_content(&items[1]), "TwoTwo");
        assert_eq!(doc.tag_name(items[0]).as_deref(), Some("li"));
    }

    #[test]
    fn test_query_is_scoped_but_matches_full_ancestry() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        assert_eq!(doc.query_all(&list, &sel("body li")).len(), 2);
        assert!(doc.query_all(&list, &sel("ol")).is_empty());
    }

    #[test]
    fn test_link_href_resolves_relative() {
        let doc = MemoryDocument::parse(PAGE, Some("https://search.example/q"));
        let links = doc.query_all(&doc.root(), &sel("a[href]"));
        assert_eq!(
            doc.link_href(&links[0]).as_deref(),
            Some("https://search.example/one")
        );
        assert_eq!(
            doc.link_href(&links[1]).as_deref(),
            Some("https://two.example/x?y=1")
        );
    }

    #[test]
    fn test_relative_href_without_base_is_none() {
        let doc = MemoryDocument::parse(PAGE, None);
        let first = doc.query(&doc.root(), &sel("a")).unwrap();
        assert_eq!(doc.link_href(&first), None);
    }

    #[test]
    fn test_first_link_skips_anchors_without_href() {
        let doc = MemoryDocument::parse(
            r#"<div id="r"><a name="top">x</a><p><a href="https://b.example/">b</a></p></div>"#,
            None,
        );
        let result = doc.query(&doc.root(), &sel("#r")).unwrap();
        let link = doc.first_link(&result).unwrap();
        assert_eq!(doc.attribute(&link, "href").as_deref(), Some("https://b.example/"));
    }

    #[test]
    fn test_closest_and_siblings() {
        let doc = MemoryDocument::parse(PAGE, None);
        let anchor = doc.query(&doc.root(), &sel("li.first a")).unwrap();
        let item = doc.closest(&anchor, &sel("li.item")).unwrap();
        assert!(doc.has_class(&item, "first"));
        let next = doc.next_element_sibling(&item).unwrap();
        assert!(!doc.has_class(&next, "first"));
        assert_eq!(doc.next_element_sibling(&next), None);
        assert_eq!(doc.closest(&anchor, &sel("table")), None);
    }

    #[test]
    fn test_insert_and_remove() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        let second = doc.query_all(&list, &sel("li"))[1];
        let marker = doc.create_element("div").unwrap();
        assert!(!doc.is_connected(marker));

        doc.insert_before(&list, &marker, &second).unwrap();
        assert!(doc.is_connected(marker));
        assert_eq!(doc.next_element_sibling(&marker), Some(second));

        let banner = doc.create_element("p").unwrap();
        doc.prepend_child(&list, &banner).unwrap();
        assert_eq!(doc.element_children(list)[0], banner);

        doc.remove(&marker).unwrap();
        assert!(!doc.is_connected(marker));
        assert!(doc.remove(&marker).is_err());
    }

    #[test]
    fn test_moving_a_child_within_its_parent() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        let items = doc.element_children(list);
        doc.prepend_child(&list, &items[1]).unwrap();
        assert_eq!(doc.element_children(list), vec![items[1], items[0]]);
        doc.append_child(&list, &items[1]).unwrap();
        assert_eq!(doc.element_children(list), vec![items[0], items[1]]);
    }

    #[test]
    fn test_insert_rejects_cycles_and_foreign_references() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        let item = doc.query(&list, &sel("li")).unwrap();
        let stray = doc.create_element("span").unwrap();
        let node = doc.create_element("div").unwrap();
        assert!(doc.insert_before(&list, &node, &stray).is_err());
        assert!(doc.append_child(&item, &list).is_err());
    }

    #[test]
    fn test_classes_and_attributes() {
        let doc = MemoryDocument::parse(PAGE, None);
        let item = doc.query(&doc.root(), &sel("li")).unwrap();
        doc.add_class(&item, "hidden").unwrap();
        doc.add_class(&item, "hidden").unwrap();
        assert_eq!(doc.attribute(&item, "class").as_deref(), Some("item first hidden"));
        assert!(doc.matches(&item, &sel("li.hidden")));
        doc.remove_class(&item, "first").unwrap();
        assert!(!doc.has_class(&item, "first"));
        assert!(!doc.matches(&item, &sel(".first")));

        doc.set_attribute(&item, "data-pair", "7").unwrap();
        assert!(doc.matches(&item, &sel("li[data-pair=\"7\"]")));
        doc.remove_attribute(&item, "data-pair").unwrap();
        assert_eq!(doc.attribute(&item, "data-pair"), None);
    }

    #[test]
    fn test_created_elements_match_selectors() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        let marker = doc.create_element("DIV").unwrap();
        doc.add_class(&marker, "serpveil-marker").unwrap();
        doc.prepend_child(&list, &marker).unwrap();
        assert_eq!(doc.query_all(&doc.root(), &sel("#results > div.serpveil-marker")), vec![marker]);
    }

    #[test]
    fn test_set_text_content_replaces_children() {
        let doc = MemoryDocument::parse(PAGE, None);
        let item = doc.query_all(&doc.root(), &sel("li"))[1];
        doc.set_text_content(&item, "replaced").unwrap();
        assert_eq!(doc.text_content(&item), "replaced");
        assert!(doc.element_children(item).is_empty());
    }

    #[test]
    fn test_observer_sees_child_list_changes_only() {
        let doc = MemoryDocument::parse(PAGE, None);
        let list = doc.query(&doc.root(), &sel("#results")).unwrap();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let observer = doc
            .observe(&list, Rc::new(move || counter.set(counter.get() + 1)))
            .unwrap();

        let item = doc.query(&list, &sel("li")).unwrap();
        doc.add_class(&item, "x").unwrap();
        assert_eq!(hits.get(), 0);

        let added = doc.append_html(list, r#"<li class="item"><a href="https://three.example/">3</a></li>"#);
        assert_eq!(added.len(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(doc.query_all(&list, &sel("li.item")).len(), 3);

        observer.disconnect();
        doc.append_html(list, "<li>4</li>");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_write_count() {
        let doc = MemoryDocument::parse(PAGE, None);
        let item = doc.query(&doc.root(), &sel("li")).unwrap();
        let before = doc.write_count();
        doc.add_class(&item, "a").unwrap();
        doc.set_attribute(&item, "title", "t").unwrap();
        assert_eq!(doc.write_count(), before + 2);
        let _ = doc.text_content(&item);
        assert_eq!(doc.write_count(), before + 2);
    }
}

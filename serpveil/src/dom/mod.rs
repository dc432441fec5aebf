//! DOM abstraction.
//!
//! This module provides:
//! - The [`Dom`] trait: the element-level operations the providers and the
//!   reconciler need from a document
//! - The [`ObserveMutations`] trait for subtree mutation subscriptions
//! - [`Selector`], the CSS selectors provider descriptors store as data
//! - [`MemoryDocument`], a scraper-backed document for tests and native use
//!
//! All methods take `&self`; documents are shared, single-threaded handles,
//! as they are in a browser.

mod memory;
mod selector;

use std::fmt::Debug;
use std::rc::Rc;

pub use memory::{MemoryDocument, MemoryObserver, NodeId};
pub use selector::Selector;

use crate::errors::DomError;

/// Element-level access to a live document.
pub trait Dom {
    /// A handle to one element.
    type Node: Clone + PartialEq + Debug;

    /// The element queries start from.
    fn root(&self) -> Self::Node;

    /// Descendants of `scope` matching `selector`, in document order.
    fn query_all(&self, scope: &Self::Node, selector: &Selector) -> Vec<Self::Node>;

    /// First descendant of `scope` matching `selector`.
    fn query(&self, scope: &Self::Node, selector: &Selector) -> Option<Self::Node> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Whether `node` matches `selector`.
    fn matches(&self, node: &Self::Node, selector: &Selector) -> bool;

    /// Parent element, if any.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Next sibling that is an element.
    fn next_element_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Closest inclusive ancestor matching `selector`.
    fn closest(&self, node: &Self::Node, selector: &Selector) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.matches(&candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(&candidate);
        }
        None
    }

    /// Whether `node` carries `class`.
    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    /// Adds `class` to `node`.
    fn add_class(&self, node: &Self::Node, class: &str) -> Result<(), DomError>;

    /// Removes `class` from `node`.
    fn remove_class(&self, node: &Self::Node, class: &str) -> Result<(), DomError>;

    /// Reads an attribute.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Writes an attribute.
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;

    /// Removes an attribute.
    fn remove_attribute(&self, node: &Self::Node, name: &str) -> Result<(), DomError>;

    /// Concatenated descendant text.
    fn text_content(&self, node: &Self::Node) -> String;

    /// Replaces all children of `node` with a single text node.
    fn set_text_content(&self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    /// Absolute URL of an anchor's `href`, resolved against the document.
    fn link_href(&self, node: &Self::Node) -> Option<String>;

    /// First `a[href]` descendant of `scope`.
    fn first_link(&self, scope: &Self::Node) -> Option<Self::Node>;

    /// Creates a detached element.
    fn create_element(&self, tag: &str) -> Result<Self::Node, DomError>;

    /// Inserts `child` as the first child of `parent`.
    fn prepend_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    /// Inserts `child` as the last child of `parent`.
    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    /// Inserts `child` into `parent` immediately before `reference`.
    fn insert_before(
        &self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: &Self::Node,
    ) -> Result<(), DomError>;

    /// Detaches `node` from the tree.
    fn remove(&self, node: &Self::Node) -> Result<(), DomError>;
}

/// Handle to an active mutation subscription.
pub trait MutationObserverHandle {
    /// Stops delivering notifications.
    fn disconnect(&self);

    /// Drops records that were queued but not yet delivered.
    fn discard_pending(&self);
}

/// Callback invoked when an observed subtree changes.
pub type MutationCallback = Rc<dyn Fn()>;

/// Documents that can report child-list/subtree mutations.
pub trait ObserveMutations: Dom {
    /// The subscription handle.
    type Observer: MutationObserverHandle;

    /// Subscribes to mutations under `root`.
    fn observe(
        &self,
        root: &Self::Node,
        callback: MutationCallback,
    ) -> Result<Self::Observer, DomError>;
}

//! The live page document over `web-sys`.

use serpveil::dom::{Dom, MutationCallback, MutationObserverHandle, ObserveMutations, Selector};
use serpveil::errors::DomError;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlAnchorElement, MutationObserver, MutationObserverInit};

/// Renders a thrown JS value for logs and errors.
pub(crate) fn describe(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn dom_error(operation: &'static str, err: &JsValue) -> DomError {
    DomError::new(operation, describe(err))
}

/// The page document.
#[derive(Debug, Clone)]
pub struct WebDom {
    document: Document,
    root: Element,
}

impl WebDom {
    /// Wraps `document`; fails when it has no root element yet.
    pub fn new(document: Document) -> Result<Self, JsValue> {
        let root = document
            .document_element()
            .ok_or_else(|| JsValue::from_str("document has no root element"))?;
        Ok(Self { document, root })
    }

    /// The wrapped document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn root(&self) -> Element {
        self.root.clone()
    }

    fn query_all(&self, scope: &Element, selector: &Selector) -> Vec<Element> {
        match scope.query_selector_all(&selector.to_string()) {
            Ok(list) => (0..list.length())
                .filter_map(|i| list.get(i))
                .filter_map(|node| node.dyn_into::<Element>().ok())
                .collect(),
            Err(e) => {
                warn!(selector = %selector, error = %describe(&e), "Selector rejected by the page");
                Vec::new()
            }
        }
    }

    fn query(&self, scope: &Element, selector: &Selector) -> Option<Element> {
        scope.query_selector(&selector.to_string()).ok().flatten()
    }

    fn matches(&self, node: &Element, selector: &Selector) -> bool {
        node.matches(&selector.to_string()).unwrap_or(false)
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn next_element_sibling(&self, node: &Element) -> Option<Element> {
        node.next_element_sibling()
    }

    fn closest(&self, node: &Element, selector: &Selector) -> Option<Element> {
        node.closest(&selector.to_string()).ok().flatten()
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn add_class(&self, node: &Element, class: &str) -> Result<(), DomError> {
        node.class_list().add_1(class).map_err(|e| dom_error("add_class", &e))
    }

    fn remove_class(&self, node: &Element, class: &str) -> Result<(), DomError> {
        node.class_list().remove_1(class).map_err(|e| dom_error("remove_class", &e))
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) -> Result<(), DomError> {
        node.set_attribute(name, value).map_err(|e| dom_error("set_attribute", &e))
    }

    fn remove_attribute(&self, node: &Element, name: &str) -> Result<(), DomError> {
        node.remove_attribute(name).map_err(|e| dom_error("remove_attribute", &e))
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, node: &Element, text: &str) -> Result<(), DomError> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn link_href(&self, node: &Element) -> Option<String> {
        let href = match node.dyn_ref::<HtmlAnchorElement>() {
            Some(anchor) => anchor.href(),
            None => node.get_attribute("href")?,
        };
        (!href.is_empty()).then_some(href)
    }

    fn first_link(&self, scope: &Element) -> Option<Element> {
        scope.query_selector("a[href]").ok().flatten()
    }

    fn create_element(&self, tag: &str) -> Result<Element, DomError> {
        self.document
            .create_element(tag)
            .map_err(|e| dom_error("create_element", &e))
    }

    fn prepend_child(&self, parent: &Element, child: &Element) -> Result<(), DomError> {
        parent
            .prepend_with_node_1(child)
            .map_err(|e| dom_error("prepend_child", &e))
    }

    fn append_child(&self, parent: &Element, child: &Element) -> Result<(), DomError> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|e| dom_error("append_child", &e))
    }

    fn insert_before(&self, parent: &Element, child: &Element, reference: &Element) -> Result<(), DomError> {
        let reference: &web_sys::Node = reference;
        parent
            .insert_before(child, Some(reference))
            .map(|_| ())
            .map_err(|e| dom_error("insert_before", &e))
    }

    fn remove(&self, node: &Element) -> Result<(), DomError> {
        if node.parent_node().is_none() {
            return Err(DomError::new("remove", "node is already detached"));
        }
        node.remove();
        Ok(())
    }
}

/// A `MutationObserver` and the closure it calls.
pub struct WebObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl MutationObserverHandle for WebObserver {
    fn disconnect(&self) {
        self.observer.disconnect();
    }

    fn discard_pending(&self) {
        self.observer.take_records();
    }
}

impl Drop for WebObserver {
    fn drop(&mut self) {
        // The closure is freed with us; the observer must not call it after.
        self.observer.disconnect();
    }
}

impl ObserveMutations for WebDom {
    type Observer = WebObserver;

    fn observe(&self, root: &Element, callback: MutationCallback) -> Result<WebObserver, DomError> {
        let closure = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, _observer: MutationObserver| callback(),
        );
        let observer = MutationObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| dom_error("observe", &e))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(root, &init)
            .map_err(|e| dom_error("observe", &e))?;
        Ok(WebObserver {
            observer,
            _callback: closure,
        })
    }
}

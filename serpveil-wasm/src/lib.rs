//! # Serpveil for the browser
//!
//! The extension content script: implements the serpveil DOM, settings,
//! localization and clock seams over `web-sys` and the extension APIs, then
//! drives a [`ContentScript`] for the current page.

#![warn(missing_docs, rust_2018_idioms)]

mod chrome;
mod dom;
mod runtime;

use std::rc::Rc;
use std::sync::Arc;

use serpveil::config::ContentScriptConfig;
use serpveil::events::LoggingEventSink;
use serpveil::observability::init_logging;
use serpveil::provider::select_provider;
use serpveil::reconcile::ContentScript;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, Event};

pub use chrome::{ChromeLocalizer, ChromeStorage};
pub use dom::{WebDom, WebObserver};
pub use runtime::{ConsoleMakeWriter, WasmClock};

type PageScript = ContentScript<WebDom, ChromeStorage, WasmClock>;

/// Content-script entry point.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let mut config = ContentScriptConfig::default();
    config.logging = config.logging.with_timestamps(false);
    if let Err(e) = init_logging(&config.logging, ConsoleMakeWriter) {
        web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
    let hostname = window.location().hostname()?;

    let script: Rc<PageScript> = Rc::new(
        ContentScript::builder(
            Rc::new(WebDom::new(document.clone())?),
            Rc::new(ChromeStorage),
            WasmClock,
            select_provider(&hostname),
        )
        .with_config(config)
        .with_localizer(&ChromeLocalizer)
        .with_events(Arc::new(LoggingEventSink::debug()))
        .build()
        .map_err(|e| JsValue::from_str(&e.to_string()))?,
    );

    install_click_handler(&document, Rc::clone(&script))?;
    script.start();
    spawn_local(async move { script.run().await });
    Ok(())
}

/// Routes clicks on markers and hide controls to the content script.
///
/// Registered in the capture phase so result links never see the click.
fn install_click_handler(document: &Document, script: Rc<PageScript>) -> Result<(), JsValue> {
    let handler = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
            return;
        };
        if script.reveal(&target) {
            event.prevent_default();
            event.stop_propagation();
            return;
        }
        if script.reconciler().control_at(script.dom(), &target).is_none() {
            return;
        }
        event.prevent_default();
        event.stop_propagation();
        let script = Rc::clone(&script);
        spawn_local(async move {
            if let Err(e) = script.hide_host_of(&target).await {
                warn!(error = %e, "Could not add hidden site");
            }
        });
    });
    document.add_event_listener_with_callback_and_bool("click", handler.as_ref().unchecked_ref(), true)?;
    handler.forget();
    Ok(())
}

//! Extension APIs: `chrome.storage.local` and `chrome.i18n`.

use async_trait::async_trait;
use serde_json::Value;
use serpveil::errors::StorageError;
use serpveil::i18n::{Localizer, MessageKey};
use serpveil::settings::{ChangeListener, SettingsChange, SettingsStore};
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::dom::describe;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    fn storage_get(keys: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_set(items: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    fn storage_add_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "i18n"], js_name = getMessage)]
    fn i18n_get_message(name: &str) -> Result<JsValue, JsValue>;
}

fn to_json(value: &JsValue) -> Result<Value, String> {
    let text = js_sys::JSON::stringify(value).map_err(|e| describe(&e))?;
    serde_json::from_str(&String::from(text)).map_err(|e| e.to_string())
}

fn from_json(value: &Value) -> Result<JsValue, String> {
    js_sys::JSON::parse(&value.to_string()).map_err(|e| describe(&e))
}

fn optional_json(value: &JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }
    to_json(value).ok()
}

/// `chrome.storage.local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

#[async_trait(?Send)]
impl SettingsStore for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let fail = |e: &JsValue| StorageError::new(key, describe(e));
        let promise = storage_get(&JsValue::from_str(key)).map_err(|e| fail(&e))?;
        let items = JsFuture::from(promise).await.map_err(|e| fail(&e))?;
        let value = js_sys::Reflect::get(&items, &JsValue::from_str(key)).map_err(|e| fail(&e))?;
        if value.is_undefined() {
            return Ok(None);
        }
        to_json(&value)
            .map(Some)
            .map_err(|message| StorageError::new(key, message))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let fail = |e: &JsValue| StorageError::new(key, describe(e));
        let items = js_sys::Object::new();
        let value = from_json(&value).map_err(|message| StorageError::new(key, message))?;
        js_sys::Reflect::set(&items, &JsValue::from_str(key), &value).map_err(|e| fail(&e))?;
        let promise = storage_set(&items).map_err(|e| fail(&e))?;
        JsFuture::from(promise).await.map_err(|e| fail(&e))?;
        Ok(())
    }

    fn on_change(&self, listener: ChangeListener) {
        let callback = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |changes: JsValue, area: JsValue| {
            if area.as_string().as_deref() != Some("local") {
                return;
            }
            let keys = js_sys::Object::keys(&js_sys::Object::from(changes.clone()));
            for key in keys.iter().filter_map(|k| k.as_string()) {
                let Ok(change) = js_sys::Reflect::get(&changes, &JsValue::from_str(&key)) else {
                    continue;
                };
                let field = |name: &str| {
                    js_sys::Reflect::get(&change, &JsValue::from_str(name))
                        .ok()
                        .and_then(|v| optional_json(&v))
                };
                listener(&SettingsChange {
                    old_value: field("oldValue"),
                    new_value: field("newValue"),
                    key,
                });
            }
        });
        if let Err(e) = storage_add_listener(&callback) {
            warn!(error = %describe(&e), "Could not subscribe to storage changes");
            return;
        }
        // Lives as long as the page.
        callback.forget();
    }
}

/// `chrome.i18n.getMessage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLocalizer;

impl Localizer for ChromeLocalizer {
    fn lookup(&self, key: MessageKey) -> String {
        i18n_get_message(key.name())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }
}

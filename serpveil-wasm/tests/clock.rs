//! Timer behaviour inside a dedicated worker, where there is no window.

#![cfg(target_arch = "wasm32")]

use serpveil::runtime::Clock;
use serpveil_wasm::WasmClock;
use std::time::Duration;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_dedicated_worker);

#[wasm_bindgen_test]
async fn test_sleep_without_window_resolves() {
    assert!(web_sys::window().is_none());
    WasmClock.sleep(Duration::from_secs(3600)).await;
}

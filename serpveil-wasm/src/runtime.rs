//! Timer and console plumbing for the page.

use async_trait::async_trait;
use serpveil::runtime::Clock;
use std::io;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

use crate::dom::describe;

/// A clock over `window.setTimeout`.
///
/// Without a window, or when scheduling fails, a sleep ends at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmClock;

#[async_trait(?Send)]
impl Clock for WasmClock {
    async fn sleep(&self, duration: Duration) {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = match web_sys::window() {
                Some(window) => window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                    .map(|_| ())
                    .map_err(|e| describe(&e)),
                None => Err("no window".to_string()),
            };
            if let Err(e) = scheduled {
                warn!(error = %e, "Could not schedule timer; resuming immediately");
                if let Err(e) = resolve.call0(&JsValue::NULL) {
                    warn!(error = %describe(&e), "Could not resume sleep");
                }
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Writes formatted log lines to the browser console.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMakeWriter;

/// One buffered log line.
#[derive(Debug, Default)]
pub struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buffer);
        let line = text.trim_end();
        if !line.is_empty() {
            web_sys::console::log_1(&JsValue::from_str(line));
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::default()
    }
}

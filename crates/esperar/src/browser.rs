//! Chromium driver over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature, [`ChromiumDocument`] implements
//! [`crate::DocumentDriver`] via chromiumoxide. Element handles are
//! backed by a `data-esperar-id` attribute stamped onto each matched node;
//! when the application replaces the node the stamp goes with it and the
//! handle reports [`crate::EsperarError::StaleElement`].
//!
//! Script builders and launch arguments live outside the feature gate so
//! they are testable without a browser.

use crate::config::BrowserSettings;
use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use serde_json::Value;

/// Attribute that carries the handle id on live nodes
pub const HANDLE_ATTRIBUTE: &str = "data-esperar-id";

/// Extra Chromium switches, matching the CI setup of the app under test
#[must_use]
pub fn launch_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args = vec!["--disable-dev-shm-usage".to_string()];
    if !settings.sandbox {
        args.push("--no-sandbox".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        settings.window_width, settings.window_height
    ));
    args
}

const TAG_FN: &str = "(el) => { \
    window.__esperarDoc = window.__esperarDoc || Math.random().toString(36).slice(2); \
    if (!el.dataset.esperarId) { \
        window.__esperarSeq = (window.__esperarSeq || 0) + 1; \
        el.dataset.esperarId = window.__esperarDoc + '-' + window.__esperarSeq; \
    } \
    return [el.dataset.esperarId, el.tagName.toLowerCase()]; }";

fn lookup(id: &str) -> String {
    format!("document.querySelector('[{HANDLE_ATTRIBUTE}={id:?}]')")
}

/// Script resolving every match of `locator` in the document to `[id, tag]` pairs
#[must_use]
pub fn find_all_script(locator: &Locator) -> String {
    let query = locator.selector().to_query_all("document");
    format!(
        "(() => {{ try {{ return {{ value: {query}.map({TAG_FN}) }}; }} \
         catch (e) {{ return {{ unsupported: String(e) }}; }} }})()"
    )
}

/// Script resolving matches of `locator` below `parent`
#[must_use]
pub fn find_within_script(parent: &ElementHandle, locator: &Locator) -> String {
    let query = locator.selector().to_query_all("root");
    format!(
        "(() => {{ const root = {lookup}; \
         if (!root || !root.isConnected) return {{ stale: true }}; \
         try {{ return {{ value: {query}.map({TAG_FN}) }}; }} \
         catch (e) {{ return {{ unsupported: String(e) }}; }} }})()",
        lookup = lookup(parent.id().as_str())
    )
}

/// Script running `body` (an expression over `el`) against a handle's node
#[must_use]
pub fn element_script(element: &ElementHandle, body: &str) -> String {
    format!(
        "(() => {{ const el = {lookup}; \
         if (!el || !el.isConnected) return {{ stale: true }}; \
         return {{ value: ({body}) }}; }})()",
        lookup = lookup(element.id().as_str())
    )
}

/// Unwrap the `{stale}` / `{unsupported}` / `{value}` envelope
pub fn decode_reply(reply: Value, stale: impl FnOnce() -> EsperarError) -> EsperarResult<Value> {
    if reply.get("stale").and_then(Value::as_bool) == Some(true) {
        return Err(stale());
    }
    if let Some(reason) = reply.get("unsupported").and_then(Value::as_str) {
        return Err(EsperarError::UnsupportedSelector {
            selector: reason.to_string(),
        });
    }
    match reply {
        Value::Object(mut map) => Ok(map.remove("value").unwrap_or(Value::Null)),
        other => Err(EsperarError::driver(format!("unexpected script reply {other}"))),
    }
}

/// `[[id, tag], ...]` into handles
pub fn decode_handles(value: &Value) -> EsperarResult<Vec<ElementHandle>> {
    let Some(items) = value.as_array() else {
        return Err(EsperarError::driver(format!("expected handle list, got {value}")));
    };
    items
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([Value::String(id), Value::String(tag)]) => Ok(ElementHandle::new(id, tag)),
            _ => Err(EsperarError::driver(format!("malformed handle {pair}"))),
        })
        .collect()
}

#[cfg(feature = "browser")]
const DISPLAYED: &str = "(() => { const s = getComputedStyle(el); \
    return s.display !== 'none' && s.visibility !== 'hidden' && el.getClientRects().length > 0; })()";

#[cfg(feature = "browser")]
const INTERACTABLE: &str = "(() => { const s = getComputedStyle(el); \
    if (s.display === 'none' || s.visibility === 'hidden' || el.getClientRects().length === 0) return false; \
    if (el.disabled) return false; \
    const r = el.getBoundingClientRect(); \
    const x = r.left + r.width / 2, y = r.top + r.height / 2; \
    if (x < 0 || y < 0 || x > innerWidth || y > innerHeight) return true; \
    const hit = document.elementFromPoint(x, y); \
    return hit === el || el.contains(hit); })()";

// Deferred so an alert raised by the handler cannot block the evaluate call.
#[cfg(feature = "browser")]
const CLICK: &str = "(() => { el.scrollIntoView({ block: 'center' }); \
    setTimeout(() => el.click(), 0); return null; })()";

#[cfg(feature = "browser")]
const CLEAR: &str = "(() => { const proto = el instanceof HTMLTextAreaElement \
    ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, ''); \
    el.dispatchEvent(new Event('input', { bubbles: true })); \
    el.dispatchEvent(new Event('change', { bubbles: true })); return null; })()";

#[cfg(feature = "browser")]
#[allow(
    clippy::wildcard_imports,
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc
)]
mod cdp {
    use super::*;
    use crate::dialog::{Dialog, DialogType};
    use crate::driver::{DocumentDriver, ReadyState};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams, DialogType as CdpDialogType,
        EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::sync::Mutex;
    use tracing::{debug, info, warn};

    type DialogSlot = Arc<StdMutex<Option<Dialog>>>;

    /// A Chromium tab driven over CDP
    #[derive(Debug)]
    pub struct ChromiumDocument {
        browser: Mutex<Option<CdpBrowser>>,
        page: CdpPage,
        dialog: DialogSlot,
        connected: Arc<AtomicBool>,
        closed: AtomicBool,
        handler: tokio::task::JoinHandle<()>,
        dialog_listener: tokio::task::JoinHandle<()>,
    }

    impl ChromiumDocument {
        /// Launch Chromium and open a blank tab
        pub async fn launch(settings: &BrowserSettings) -> EsperarResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(settings.window_width, settings.window_height)
                .args(launch_args(settings));

            if !settings.headless {
                builder = builder.with_head();
            }
            if !settings.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = settings.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder.build().map_err(EsperarError::session_unavailable)?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| EsperarError::session_unavailable(e.to_string()))?;

            let connected = Arc::new(AtomicBool::new(true));
            let handler_flag = Arc::clone(&connected);
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
                handler_flag.store(false, Ordering::SeqCst);
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| EsperarError::session_unavailable(e.to_string()))?;

            let dialog: DialogSlot = Arc::new(StdMutex::new(None));
            let mut openings = page
                .event_listener::<EventJavascriptDialogOpening>()
                .await
                .map_err(|e| EsperarError::session_unavailable(e.to_string()))?;
            let slot = Arc::clone(&dialog);
            let dialog_listener = tokio::spawn(async move {
                while let Some(event) = openings.next().await {
                    let message = event.message.clone();
                    let opened = match event.r#type {
                        CdpDialogType::Alert => Dialog::alert(message),
                        CdpDialogType::Confirm => Dialog::new(DialogType::Confirm, message),
                        CdpDialogType::Prompt => {
                            Dialog::prompt(message, event.default_prompt.clone())
                        }
                        CdpDialogType::Beforeunload => {
                            Dialog::new(DialogType::BeforeUnload, message)
                        }
                    };
                    debug!(
                        kind = %opened.dialog_type(),
                        message = %opened.message(),
                        "dialog opened"
                    );
                    if let Ok(mut open) = slot.lock() {
                        *open = Some(opened);
                    }
                }
            });

            info!(headless = settings.headless, "chromium launched");
            Ok(Self {
                browser: Mutex::new(Some(browser)),
                page,
                dialog,
                connected,
                closed: AtomicBool::new(false),
                handler,
                dialog_listener,
            })
        }

        fn ensure_session(&self) -> EsperarResult<()> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(EsperarError::session_unavailable("session closed"));
            }
            if !self.connected.load(Ordering::SeqCst) {
                return Err(EsperarError::session_unavailable("browser disconnected"));
            }
            Ok(())
        }

        fn open_dialog(&self) -> EsperarResult<Option<Dialog>> {
            self.dialog
                .lock()
                .map(|d| d.clone())
                .map_err(|_| EsperarError::driver("dialog state poisoned"))
        }

        /// Page-level commands refuse to run behind an open dialog
        fn ensure_page(&self) -> EsperarResult<()> {
            self.ensure_session()?;
            match self.open_dialog()? {
                Some(dialog) => Err(EsperarError::DialogOpen {
                    message: dialog.message().to_string(),
                }),
                None => Ok(()),
            }
        }

        fn transport(&self, e: &chromiumoxide::error::CdpError) -> EsperarError {
            if self.connected.load(Ordering::SeqCst) {
                EsperarError::driver(e.to_string())
            } else {
                EsperarError::session_unavailable(e.to_string())
            }
        }

        async fn run(&self, script: String) -> EsperarResult<Value> {
            self.ensure_page()?;
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| self.transport(&e))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }

        async fn on_element(&self, element: &ElementHandle, body: &str) -> EsperarResult<Value> {
            let reply = self.run(element_script(element, body)).await?;
            decode_reply(reply, || element.stale())
        }
    }

    #[async_trait]
    impl DocumentDriver for ChromiumDocument {
        async fn navigate(&self, url: &str) -> EsperarResult<()> {
            self.ensure_page()?;
            self.page
                .goto(url)
                .await
                .map_err(|e| EsperarError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn refresh(&self) -> EsperarResult<()> {
            self.ensure_page()?;
            self.page.reload().await.map_err(|e| self.transport(&e))?;
            Ok(())
        }

        async fn current_url(&self) -> EsperarResult<String> {
            self.ensure_page()?;
            let url = self.page.url().await.map_err(|e| self.transport(&e))?;
            Ok(url.unwrap_or_default())
        }

        async fn title(&self) -> EsperarResult<String> {
            self.ensure_page()?;
            let title = self.page.get_title().await.map_err(|e| self.transport(&e))?;
            Ok(title.unwrap_or_default())
        }

        async fn ready_state(&self) -> EsperarResult<ReadyState> {
            let value = self.run("document.readyState".to_string()).await?;
            value
                .as_str()
                .ok_or_else(|| EsperarError::driver(format!("readyState was {value}")))?
                .parse()
        }

        async fn evaluate(&self, script: &str) -> EsperarResult<Value> {
            self.run(script.to_string()).await
        }

        async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
            let reply = self.run(find_all_script(locator)).await?;
            let value = decode_reply(reply, || EsperarError::driver("document detached"))?;
            decode_handles(&value)
        }

        async fn find_within(
            &self,
            parent: &ElementHandle,
            locator: &Locator,
        ) -> EsperarResult<Vec<ElementHandle>> {
            let reply = self.run(find_within_script(parent, locator)).await?;
            let value = decode_reply(reply, || parent.stale())?;
            decode_handles(&value)
        }

        async fn text(&self, element: &ElementHandle) -> EsperarResult<String> {
            let value = self.on_element(element, "el.innerText").await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> EsperarResult<Option<String>> {
            let body = format!("{name:?} === 'value' ? el.value : el.getAttribute({name:?})");
            let value = self.on_element(element, &body).await?;
            Ok(value.as_str().map(str::to_string))
        }

        async fn is_displayed(&self, element: &ElementHandle) -> EsperarResult<bool> {
            let value = self.on_element(element, DISPLAYED).await?;
            Ok(value.as_bool().unwrap_or(false))
        }

        async fn is_interactable(&self, element: &ElementHandle) -> EsperarResult<bool> {
            let value = self.on_element(element, INTERACTABLE).await?;
            Ok(value.as_bool().unwrap_or(false))
        }

        async fn click(&self, element: &ElementHandle) -> EsperarResult<()> {
            self.on_element(element, CLICK).await?;
            Ok(())
        }

        async fn clear(&self, element: &ElementHandle) -> EsperarResult<()> {
            self.on_element(element, CLEAR).await?;
            Ok(())
        }

        async fn send_keys(&self, element: &ElementHandle, text: &str) -> EsperarResult<()> {
            self.on_element(element, "(el.focus(), null)").await?;
            self.page
                .execute(InsertTextParams::new(text))
                .await
                .map_err(|e| self.transport(&e))?;
            Ok(())
        }

        async fn scroll_into_view(&self, element: &ElementHandle) -> EsperarResult<()> {
            self.on_element(element, "(el.scrollIntoView({ block: 'center' }), null)")
                .await?;
            Ok(())
        }

        async fn pending_dialog(&self) -> EsperarResult<Option<Dialog>> {
            self.ensure_session()?;
            self.open_dialog()
        }

        async fn accept_dialog(&self) -> EsperarResult<()> {
            self.ensure_session()?;
            if self.open_dialog()?.is_none() {
                return Err(EsperarError::driver("no such alert"));
            }
            self.page
                .execute(HandleJavaScriptDialogParams::new(true))
                .await
                .map_err(|e| self.transport(&e))?;
            if let Ok(mut open) = self.dialog.lock() {
                *open = None;
            }
            Ok(())
        }

        async fn screenshot(&self) -> EsperarResult<Vec<u8>> {
            self.ensure_page()?;
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = self
                .page
                .execute(params)
                .await
                .map_err(|e| self.transport(&e))?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| EsperarError::driver(format!("screenshot decode: {e}")))
        }

        async fn close(&self) -> EsperarResult<()> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            self.dialog_listener.abort();
            let mut browser = self.browser.lock().await;
            let result = match browser.as_mut() {
                Some(b) => b.close().await.map(|_| ()).map_err(|e| e.to_string()),
                None => Ok(()),
            };
            if let Some(mut b) = browser.take() {
                if let Err(e) = b.wait().await {
                    warn!(error = %e, "chromium did not exit cleanly");
                }
            }
            self.handler.abort();
            info!("chromium closed");
            result.map_err(EsperarError::driver)
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDocument;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod launch_tests {
        use super::*;

        #[test]
        fn test_default_args_match_ci_setup() {
            let args = launch_args(&BrowserSettings::default());
            assert!(args.contains(&"--no-sandbox".to_string()));
            assert!(args.contains(&"--disable-dev-shm-usage".to_string()));
            assert!(args.contains(&"--window-size=1920,1080".to_string()));
        }

        #[test]
        fn test_sandbox_kept_when_requested() {
            let settings = BrowserSettings {
                sandbox: true,
                ..BrowserSettings::default()
            };
            assert!(!launch_args(&settings).contains(&"--no-sandbox".to_string()));
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_find_all_script_uses_css_form() {
            let script = find_all_script(&Locator::name("email"));
            assert!(script.contains("document.querySelectorAll"));
            assert!(script.contains("[name=\\\"email\\\"]"));
            assert!(script.contains("esperarId"));
        }

        #[test]
        fn test_element_script_looks_up_stamp() {
            let handle = ElementHandle::new("abc-3", "button");
            let script = element_script(&handle, "el.innerText");
            assert!(script.contains("data-esperar-id=\"abc-3\""));
            assert!(script.contains("stale: true"));
        }

        #[test]
        fn test_find_within_scopes_to_parent() {
            let row = ElementHandle::new("abc-9", "tr");
            let script = find_within_script(&row, &Locator::tag_name("td"));
            assert!(script.contains("root.querySelectorAll"));
            assert!(script.contains("abc-9"));
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_stale_reply() {
            let handle = ElementHandle::new("x-1", "td");
            let err = decode_reply(json!({"stale": true}), || handle.stale()).unwrap_err();
            assert!(err.is_transient());
        }

        #[test]
        fn test_unsupported_reply() {
            let err = decode_reply(json!({"unsupported": "SyntaxError"}), || {
                EsperarError::driver("unused")
            })
            .unwrap_err();
            assert!(matches!(err, EsperarError::UnsupportedSelector { .. }));
        }

        #[test]
        fn test_value_reply() {
            let value =
                decode_reply(json!({"value": "hello"}), || EsperarError::driver("unused")).unwrap();
            assert_eq!(value, json!("hello"));
        }

        #[test]
        fn test_handles() {
            let handles = decode_handles(&json!([["a-1", "tr"], ["a-2", "tr"]])).unwrap();
            assert_eq!(handles.len(), 2);
            assert_eq!(handles[1].id().as_str(), "a-2");
            assert_eq!(handles[0].tag_name(), "tr");
        }

        #[test]
        fn test_malformed_handles() {
            assert!(decode_handles(&json!([["a-1"]])).is_err());
            assert!(decode_handles(&json!({"not": "a list"})).is_err());
        }
    }
}

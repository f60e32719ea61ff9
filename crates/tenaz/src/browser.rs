//! Browser control for real sessions.
//!
//! [`BrowserConfig`] describes how Chromium is launched. With the `browser`
//! feature, [`ChromiumDriver`] implements [`Driver`](crate::driver::Driver)
//! over the Chrome `DevTools` Protocol via chromiumoxide. Locators are resolved
//! in-page from [`Locator::to_query`](crate::locator::Locator::to_query);
//! pointer and keyboard input go through the CDP `Input` domain so the page
//! sees trusted events.

// The scripts below are only driven by `ChromiumDriver`
#![cfg_attr(not(feature = "browser"), allow(dead_code))]

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Script body run against the single element `el`; returns its box or null
const RECT_JS: &str = "el.scrollIntoView({ block: 'center', inline: 'center' }); \
    const r = el.getBoundingClientRect(); \
    return (r.width > 0 && r.height > 0) ? { x: r.x, y: r.y, width: r.width, height: r.height } : null;";

const VISIBLE_JS: &str = "const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none' && s.opacity !== '0';";

/// HTML5 drag events with a shared `DataTransfer`, dispatched by script
const DRAG_JS: &str = "const dt = new DataTransfer(); \
    const fire = (node, type) => node.dispatchEvent(new DragEvent(type, { bubbles: true, cancelable: true, dataTransfer: dt })); \
    fire(src, 'dragstart'); fire(dst, 'dragenter'); fire(dst, 'dragover'); fire(dst, 'drop'); fire(src, 'dragend'); \
    return true;";

const SET_VALUE_JS: &str = "const proto = Object.getPrototypeOf(el); \
    const setter = Object.getOwnPropertyDescriptor(proto, 'value'); \
    if (setter && setter.set) { setter.set.call(el, value); } else { el.value = value; } \
    el.dispatchEvent(new Event('input', { bubbles: true })); \
    el.dispatchEvent(new Event('change', { bubbles: true })); \
    return true;";

/// `true`/`false` for checkables, a string otherwise
const CHECKED_JS: &str = "return (el.type === 'checkbox' || el.type === 'radio') ? !!el.checked : 'uncheckable';";

const SET_CHECKED_JS: &str = "if (el.type !== 'checkbox' && el.type !== 'radio') return false; \
    el.checked = checked; \
    el.dispatchEvent(new Event('input', { bubbles: true })); \
    el.dispatchEvent(new Event('change', { bubbles: true })); \
    return true;";

/// Matches an option by value, label or visible text
const SELECT_OPTION_JS: &str = "const opt = Array.from(el.options || []) \
        .find(o => o.value === option || o.label === option || o.text.trim() === option); \
    if (!opt) return false; \
    el.value = opt.value; \
    el.dispatchEvent(new Event('input', { bubbles: true })); \
    el.dispatchEvent(new Event('change', { bubbles: true })); \
    return true;";

/// Wrap `body` so it runs with `el` bound to the single match of `query`
fn with_element(query: &str, body: &str) -> String {
    format!("(() => {{ const els = {query}; if (els.length !== 1) return null; const el = els[0]; {body} }})()")
}

fn load_state_js(state: crate::wait::LoadState) -> String {
    use crate::wait::{LoadState, NETWORK_IDLE_THRESHOLD_MS};
    match state {
        LoadState::DomContentLoaded => "document.readyState !== 'loading'".to_string(),
        LoadState::Load => "document.readyState === 'complete'".to_string(),
        LoadState::NetworkIdle => format!(
            "(() => {{ if (document.readyState !== 'complete') return false; \
             const last = performance.getEntriesByType('resource').reduce((m, e) => Math.max(m, e.responseEnd), 0); \
             return performance.now() - last >= {NETWORK_IDLE_THRESHOLD_MS}; }})()"
        ),
    }
}

#[cfg(feature = "browser")]
mod cdp {
    use super::{
        load_state_js, with_element, BrowserConfig, CHECKED_JS, DRAG_JS, RECT_JS, SELECT_OPTION_JS,
        SET_CHECKED_JS, SET_VALUE_JS, VISIBLE_JS,
    };
    use crate::driver::{DocumentId, DocumentStream, Driver};
    use crate::locator::{BoundingBox, Locator, Point};
    use crate::result::{TenazError, TenazResult};
    use crate::wait::{poll_until, LoadState};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, InsertTextParams, MouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::target::{EventTargetCreated, TargetId};
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tracing::{debug, info};

    fn document_error(e: impl std::fmt::Display) -> TenazError {
        TenazError::DocumentError {
            message: e.to_string(),
        }
    }

    fn input_error(e: impl std::fmt::Display) -> TenazError {
        TenazError::InputError {
            message: e.to_string(),
        }
    }

    fn script_error(e: impl std::fmt::Display) -> TenazError {
        TenazError::ScriptError {
            message: e.to_string(),
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct PointerState {
        position: Point,
        pressed: bool,
    }

    /// [`Driver`] backed by a Chromium instance over CDP
    #[derive(Debug)]
    pub struct ChromiumDriver {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        pointer: Mutex<PointerState>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumDriver {
        /// Launch Chromium
        pub async fn launch(config: BrowserConfig) -> TenazResult<Self> {
            let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder
                .build()
                .map_err(|message| TenazError::BrowserLaunchError { message })?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                TenazError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            info!(headless = config.headless, "chromium launched");

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                pointer: Mutex::new(PointerState {
                    position: Point::new(0.0, 0.0),
                    pressed: false,
                }),
                handle,
            })
        }

        /// Open a new document at `url`; use the first one as the session's primary
        pub async fn open(&self, url: &str) -> TenazResult<DocumentId> {
            let browser = self.inner.lock().await;
            let page = browser.new_page(url).await.map_err(|e| TenazError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(DocumentId::new(page.target_id().inner().clone()))
        }

        /// Launch configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(self) -> TenazResult<()> {
            let mut browser = self.inner.lock().await;
            browser.close().await.map_err(document_error)?;
            self.handle.abort();
            Ok(())
        }

        async fn page(&self, doc: &DocumentId) -> TenazResult<CdpPage> {
            let browser = self.inner.lock().await;
            browser
                .get_page(TargetId::new(doc.as_str()))
                .await
                .map_err(|_| TenazError::UnknownDocument {
                    id: doc.to_string(),
                })
        }

        async fn eval<T: DeserializeOwned>(&self, doc: &DocumentId, expr: String) -> TenazResult<T> {
            let page = self.page(doc).await?;
            page.evaluate(expr)
                .await
                .map_err(script_error)?
                .into_value::<T>()
                .map_err(script_error)
        }

        /// Run `body` against the unique match of `locator`
        async fn on_element<T: DeserializeOwned>(
            &self,
            doc: &DocumentId,
            locator: &Locator,
            body: &str,
        ) -> TenazResult<T> {
            let value: Option<T> = self.eval(doc, with_element(&locator.to_query(), body)).await?;
            match value {
                Some(v) => Ok(v),
                None => Err(TenazError::LocatorMismatch {
                    selector: locator.to_string(),
                    count: self.count(doc, locator).await?,
                }),
            }
        }

        async fn mouse(
            &self,
            doc: &DocumentId,
            kind: DispatchMouseEventType,
            at: Point,
            pressed: bool,
        ) -> TenazResult<()> {
            let mut params = DispatchMouseEventParams::builder().r#type(kind).x(at.x).y(at.y);
            if pressed || !matches!(kind, DispatchMouseEventType::MouseMoved) {
                params = params
                    .button(MouseButton::Left)
                    .buttons(i64::from(pressed))
                    .click_count(1);
            }
            let params = params.build().map_err(input_error)?;
            self.page(doc).await?.execute(params).await.map_err(input_error)?;
            Ok(())
        }

        async fn center(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<Point> {
            self.bounding_box(doc, locator)
                .await?
                .map(|b| b.center())
                .ok_or_else(|| TenazError::InputError {
                    message: format!("{locator} is not laid out"),
                })
        }
    }

    #[async_trait]
    impl Driver for ChromiumDriver {
        async fn count(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<usize> {
            self.eval(doc, format!("({}).length", locator.to_query())).await
        }

        async fn is_visible(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool> {
            self.on_element(doc, locator, VISIBLE_JS).await
        }

        async fn bounding_box(
            &self,
            doc: &DocumentId,
            locator: &Locator,
        ) -> TenazResult<Option<BoundingBox>> {
            let query = with_element(&locator.to_query(), RECT_JS);
            let count = self.count(doc, locator).await?;
            if count != 1 {
                return Err(TenazError::LocatorMismatch {
                    selector: locator.to_string(),
                    count,
                });
            }
            self.eval(doc, query).await
        }

        async fn drag_to(
            &self,
            doc: &DocumentId,
            source: &Locator,
            target: &Locator,
        ) -> TenazResult<()> {
            if self.bounding_box(doc, source).await?.is_none() || self.bounding_box(doc, target).await?.is_none() {
                return Err(TenazError::InputError {
                    message: format!("cannot drag {source} onto {target}: not laid out"),
                });
            }
            let expr = format!(
                "(() => {{ const s = {}; const d = {}; if (s.length !== 1 || d.length !== 1) return null; \
                 const src = s[0]; const dst = d[0]; {DRAG_JS} }})()",
                source.to_query(),
                target.to_query()
            );
            let fired: Option<bool> = self.eval(doc, expr).await?;
            fired.map(|_| ()).ok_or_else(|| TenazError::InputError {
                message: format!("drag {source} onto {target} lost an element"),
            })
        }

        async fn hover(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()> {
            let at = self.center(doc, locator).await?;
            let mut pointer = self.pointer.lock().await;
            self.mouse(doc, DispatchMouseEventType::MouseMoved, at, pointer.pressed).await?;
            pointer.position = at;
            Ok(())
        }

        async fn pointer_down(&self, doc: &DocumentId) -> TenazResult<()> {
            let mut pointer = self.pointer.lock().await;
            self.mouse(doc, DispatchMouseEventType::MousePressed, pointer.position, true).await?;
            pointer.pressed = true;
            Ok(())
        }

        async fn pointer_move(&self, doc: &DocumentId, to: Point) -> TenazResult<()> {
            let mut pointer = self.pointer.lock().await;
            self.mouse(doc, DispatchMouseEventType::MouseMoved, to, pointer.pressed).await?;
            pointer.position = to;
            Ok(())
        }

        async fn pointer_up(&self, doc: &DocumentId) -> TenazResult<()> {
            let mut pointer = self.pointer.lock().await;
            pointer.pressed = false;
            self.mouse(doc, DispatchMouseEventType::MouseReleased, pointer.position, false).await
        }

        async fn click(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()> {
            let at = self.center(doc, locator).await?;
            let mut pointer = self.pointer.lock().await;
            self.mouse(doc, DispatchMouseEventType::MouseMoved, at, false).await?;
            self.mouse(doc, DispatchMouseEventType::MousePressed, at, true).await?;
            self.mouse(doc, DispatchMouseEventType::MouseReleased, at, false).await?;
            *pointer = PointerState {
                position: at,
                pressed: false,
            };
            Ok(())
        }

        async fn fill(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()> {
            let _: bool = self
                .on_element(doc, locator, "el.focus(); if (el.select) el.select(); return true;")
                .await?;
            if text.is_empty() {
                return self.set_value(doc, locator, "").await;
            }
            self.page(doc)
                .await?
                .execute(InsertTextParams::new(text))
                .await
                .map_err(input_error)?;
            Ok(())
        }

        async fn type_text(&self, doc: &DocumentId, text: &str) -> TenazResult<()> {
            let page = self.page(doc).await?;
            for ch in text.chars() {
                for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
                    let mut params = DispatchKeyEventParams::builder().r#type(kind.clone());
                    if matches!(kind, DispatchKeyEventType::KeyDown) {
                        params = params.text(ch.to_string());
                    }
                    let params = params.build().map_err(input_error)?;
                    page.execute(params).await.map_err(input_error)?;
                }
            }
            debug!(doc = %doc, chars = text.chars().count(), "typed text");
            Ok(())
        }

        async fn set_value(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()> {
            let body = format!("const value = {text:?}; {SET_VALUE_JS}");
            let _: bool = self.on_element(doc, locator, &body).await?;
            Ok(())
        }

        async fn input_value(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<String> {
            self.on_element(doc, locator, "return el.value === undefined ? '' : String(el.value);")
                .await
        }

        async fn is_checked(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool> {
            let state: serde_json::Value = self.on_element(doc, locator, CHECKED_JS).await?;
            state.as_bool().ok_or_else(|| TenazError::InputError {
                message: format!("{locator} is not a checkbox or radio"),
            })
        }

        async fn set_checked(&self, doc: &DocumentId, locator: &Locator, checked: bool) -> TenazResult<()> {
            let body = format!("const checked = {checked}; {SET_CHECKED_JS}");
            let assigned: bool = self.on_element(doc, locator, &body).await?;
            if assigned {
                Ok(())
            } else {
                Err(TenazError::ScriptError {
                    message: format!("{locator} has no checked state"),
                })
            }
        }

        async fn select_option(&self, doc: &DocumentId, locator: &Locator, option: &str) -> TenazResult<()> {
            let body = format!("const option = {option:?}; {SELECT_OPTION_JS}");
            let selected: bool = self.on_element(doc, locator, &body).await?;
            if selected {
                Ok(())
            } else {
                Err(TenazError::InputError {
                    message: format!("{locator} has no option {option:?}"),
                })
            }
        }

        async fn current_url(&self, doc: &DocumentId) -> TenazResult<String> {
            let url = self.page(doc).await?.url().await.map_err(document_error)?;
            Ok(url.unwrap_or_default())
        }

        async fn go_back(&self, doc: &DocumentId) -> TenazResult<()> {
            let _: bool = self.eval(doc, "(() => { history.back(); return true; })()".to_string()).await?;
            Ok(())
        }

        async fn wait_for_load_state(
            &self,
            doc: &DocumentId,
            state: LoadState,
            timeout: Duration,
        ) -> TenazResult<()> {
            let expr = load_state_js(state);
            let result = poll_until(timeout, Duration::from_millis(100), state.event_name(), || {
                let expr = expr.clone();
                async move { self.eval::<bool>(doc, expr).await.unwrap_or(false) }
            })
            .await;
            if result.success {
                Ok(())
            } else {
                Err(TenazError::Timeout {
                    ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }

        async fn subscribe_documents(&self) -> TenazResult<DocumentStream> {
            let browser = self.inner.lock().await;
            let created = browser
                .event_listener::<EventTargetCreated>()
                .await
                .map_err(document_error)?;
            Ok(created
                .filter_map(|event| {
                    let info = &event.target_info;
                    let doc = (info.r#type == "page").then(|| DocumentId::new(info.target_id.inner().clone()));
                    futures::future::ready(doc)
                })
                .boxed())
        }

        async fn documents(&self) -> TenazResult<Vec<DocumentId>> {
            let browser = self.inner.lock().await;
            let pages = browser.pages().await.map_err(document_error)?;
            Ok(pages
                .iter()
                .map(|p| DocumentId::new(p.target_id().inner().clone()))
                .collect())
        }

        async fn close_document(&self, doc: &DocumentId) -> TenazResult<()> {
            self.page(doc).await?.close().await.map_err(document_error)
        }

        async fn bring_to_front(&self, doc: &DocumentId) -> TenazResult<()> {
            self.page(doc).await?.bring_to_front().await.map_err(document_error)?;
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;

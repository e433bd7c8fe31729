//! Chromium engine over the DevTools protocol (chromiumoxide).
//!
//! One browser process is launched lazily per [`LaunchProfile`]; every
//! `open_context` creates a fresh `Target.createBrowserContext` (separate
//! cookies, storage and cache) with one page in it, disposed on close.
//!
//! Element discovery runs `resolver.js` in the page. It computes roles,
//! accessible names, labels and visibility and keeps scanned elements in a
//! page-side ref table, so no attributes are written into the DOM.

use crate::config::{LaunchProfile, SessionConfig};
use crate::driver::{Action, BrowserEngine, ElementRef, ElementState, PageDriver, PageState, ScanKind};
use crate::result::{SondeoError, SondeoResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const RESOLVER: &str = include_str!("resolver.js");

fn driver_error(e: impl std::fmt::Display) -> SondeoError {
    SondeoError::driver(e.to_string())
}

/// A launched browser process and its protocol handler task
#[derive(Debug)]
struct LaunchedBrowser {
    browser: Mutex<CdpBrowser>,
    handler: tokio::task::JoinHandle<()>,
}

impl LaunchedBrowser {
    async fn launch(profile: &LaunchProfile, config: &SessionConfig) -> SondeoResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

        // chromiumoxide launches headless unless asked for a window
        if !profile.headless {
            builder = builder.with_head();
        }
        if !profile.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = profile.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(SondeoError::environment)?;
        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| SondeoError::environment(format!("failed to launch chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "cdp handler event error");
                }
            }
        });

        tracing::info!(headless = profile.headless, sandbox = profile.sandbox, "launched chromium");
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

/// Browser engine backed by Chromium
#[derive(Debug, Default)]
pub struct ChromiumEngine {
    browsers: Mutex<HashMap<LaunchProfile, Arc<LaunchedBrowser>>>,
}

impl ChromiumEngine {
    /// Create an engine; nothing is launched until the first context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn browser_for(&self, config: &SessionConfig) -> SondeoResult<Arc<LaunchedBrowser>> {
        let profile = config.launch_profile();
        let mut browsers = self.browsers.lock().await;
        if let Some(browser) = browsers.get(&profile) {
            return Ok(browser.clone());
        }
        let launched = Arc::new(LaunchedBrowser::launch(&profile, config).await?);
        let _ = browsers.insert(profile, launched.clone());
        Ok(launched)
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_context(&self, config: &SessionConfig) -> SondeoResult<Box<dyn PageDriver>> {
        let launched = self.browser_for(config).await?;
        let mut browser = launched.browser.lock().await;

        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| SondeoError::environment(format!("failed to create browser context: {e}")))?;
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(SondeoError::environment)?;
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| SondeoError::environment(format!("failed to open page: {e}")))?;
        drop(browser);

        let _ = page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(config.viewport_width),
                i64::from(config.viewport_height),
                1.0,
                false,
            ))
            .await
            .map_err(driver_error)?;

        Ok(Box::new(ChromiumPage {
            page: Some(page),
            context_id: Some(context_id),
            browser: launched,
        }))
    }

    async fn shutdown(&self) -> SondeoResult<()> {
        let mut browsers = self.browsers.lock().await;
        for (profile, launched) in browsers.drain() {
            let mut browser = launched.browser.lock().await;
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, headless = profile.headless, "error closing chromium");
            }
            let _ = browser.wait().await;
            launched.handler.abort();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

#[derive(Debug, Deserialize)]
struct ScanReply {
    #[serde(default)]
    items: Vec<ElementState>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpReply {
    error: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
}

/// One page in its own browser context
#[derive(Debug)]
pub struct ChromiumPage {
    page: Option<CdpPage>,
    context_id: Option<BrowserContextId>,
    browser: Arc<LaunchedBrowser>,
}

impl ChromiumPage {
    fn page(&self) -> SondeoResult<&CdpPage> {
        self.page
            .as_ref()
            .ok_or_else(|| SondeoError::lifecycle("page is closed"))
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, args: Value) -> SondeoResult<T> {
        let expression = format!("({RESOLVER})({}, {args})", serde_json::to_string(op)?);
        self.page()?
            .evaluate(expression)
            .await
            .map_err(driver_error)?
            .into_value::<T>()
            .map_err(driver_error)
    }

    async fn element_op(&self, op: &str, element: ElementRef, extra: Value) -> SondeoResult<OpReply> {
        let mut args = json!({ "ref": element.0 });
        if let (Value::Object(target), Value::Object(source)) = (&mut args, extra) {
            target.extend(source);
        }
        let reply: OpReply = self.call(op, args).await?;
        match reply.error {
            Some(message) => Err(SondeoError::driver(message)),
            None => Ok(reply),
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> SondeoResult<PageState> {
        let _ = self
            .page()?
            .goto(url)
            .await
            .map_err(|e| SondeoError::navigation(url, e.to_string()))?;
        self.page_state().await
    }

    async fn page_state(&self) -> SondeoResult<PageState> {
        self.call("page", Value::Null).await
    }

    async fn scan(&self, kind: &ScanKind) -> SondeoResult<Vec<ElementState>> {
        let args = match kind {
            ScanKind::Role(role) => json!({ "kind": "role", "arg": role }),
            ScanKind::Label => json!({ "kind": "label" }),
            ScanKind::Placeholder => json!({ "kind": "placeholder" }),
            ScanKind::Text => json!({ "kind": "text" }),
            ScanKind::Css(selector) => json!({ "kind": "css", "arg": selector }),
        };
        let reply: ScanReply = self.call("scan", args).await?;
        match reply.error {
            Some(message) => Err(SondeoError::config(format!("invalid locator: {message}"))),
            None => Ok(reply.items),
        }
    }

    async fn perform(&mut self, element: ElementRef, action: &Action) -> SondeoResult<()> {
        match action {
            Action::Click => {
                let reply = self.element_op("point", element, json!({})).await?;
                let (Some(x), Some(y)) = (reply.x, reply.y) else {
                    return Err(SondeoError::driver("element has no clickable point"));
                };
                let _ = self.page()?.click(Point::new(x, y)).await.map_err(driver_error)?;
            }
            Action::Fill(text) => {
                let _ = self.element_op("clear", element, json!({})).await?;
                if !text.is_empty() {
                    let _ = self
                        .page()?
                        .execute(InsertTextParams::new(text.clone()))
                        .await
                        .map_err(driver_error)?;
                }
                let _ = self.element_op("changed", element, json!({})).await?;
            }
            Action::Focus => {
                let _ = self.element_op("focus", element, json!({})).await?;
            }
            Action::Blur => {
                let _ = self.element_op("blur", element, json!({})).await?;
            }
            Action::SelectOption(value) => {
                let _ = self
                    .element_op("select", element, json!({ "value": value }))
                    .await?;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> SondeoResult<()> {
        let page = self.page.take();
        let context_id = self.context_id.take();
        let launched = Arc::clone(&self.browser);
        teardown(
            async move {
                match page {
                    Some(page) => page.close().await.map_err(driver_error),
                    None => Ok(()),
                }
            },
            async move {
                match context_id {
                    Some(context_id) => {
                        let browser = launched.browser.lock().await;
                        browser
                            .dispose_browser_context(context_id)
                            .await
                            .map_err(driver_error)
                    }
                    None => Ok(()),
                }
            },
        )
        .await
    }
}

/// Runs both teardown steps. Disposal happens even when closing the page
/// failed; the first error is the one reported.
async fn teardown<P, D>(close_page: P, dispose_context: D) -> SondeoResult<()>
where
    P: std::future::Future<Output = SondeoResult<()>>,
    D: std::future::Future<Output = SondeoResult<()>>,
{
    let closed = close_page.await;
    if let Err(ref e) = closed {
        tracing::warn!(error = %e, "page close failed, disposing context anyway");
    }
    let disposed = dispose_context.await;
    closed.and(disposed)
}

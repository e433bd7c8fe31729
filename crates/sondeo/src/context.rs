//! Session management: isolated test contexts with guaranteed release.
//!
//! ## Lifecycle
//!
//! ```text
//! acquire ──► TestContext ──► navigate / locate / act / expect ──► release
//!                  │                                                  │
//!                  └──────── handles fail with Lifecycle after ◄──────┘
//! ```
//!
//! [`SessionManager::release`] consumes the context, so it runs at most once
//! per context; [`SessionManager::run_scoped`] makes it run exactly once on
//! every exit path, panics included.

use crate::config::SessionConfig;
use crate::driver::{BrowserEngine, PageDriver, PageState};
use crate::locator::{ElementHandle, LocatorSpec};
use crate::result::{SondeoError, SondeoResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

/// Shared slot holding a context's page while it is live
pub(crate) type PageSlot = Arc<Mutex<Option<Box<dyn PageDriver>>>>;

/// Body of a scoped test
pub type TestBody<'a> = BoxFuture<'a, SondeoResult<()>>;

/// An isolated execution unit owned by exactly one test
pub struct TestContext {
    id: Uuid,
    config: Arc<SessionConfig>,
    page: PageSlot,
    released: bool,
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("id", &self.id)
            .field("base_url", &self.config.base_url)
            .field("released", &self.released)
            .finish()
    }
}

impl TestContext {
    /// Unique identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Resolved configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Base URL for relative navigation
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Bind a locator to this context's page
    #[must_use]
    pub fn locate(&self, spec: LocatorSpec) -> ElementHandle {
        ElementHandle::new(spec, self.page.clone(), self.config.clone(), self.id)
    }

    /// `locate(LocatorSpec::role(role))`
    #[must_use]
    pub fn get_by_role(&self, role: &str) -> ElementHandle {
        self.locate(LocatorSpec::role(role))
    }

    /// `locate(LocatorSpec::role(role).with_name(name))`
    #[must_use]
    pub fn get_by_role_named(&self, role: &str, name: &str) -> ElementHandle {
        self.locate(LocatorSpec::role(role).with_name(name))
    }

    /// `locate(LocatorSpec::label(text))`
    #[must_use]
    pub fn get_by_label(&self, text: &str) -> ElementHandle {
        self.locate(LocatorSpec::label(text))
    }

    /// `locate(LocatorSpec::placeholder(text))`
    #[must_use]
    pub fn get_by_placeholder(&self, text: &str) -> ElementHandle {
        self.locate(LocatorSpec::placeholder(text))
    }

    /// `locate(LocatorSpec::text(text))`
    #[must_use]
    pub fn get_by_text(&self, text: &str) -> ElementHandle {
        self.locate(LocatorSpec::text(text))
    }

    /// `locate(LocatorSpec::selector(css))`
    #[must_use]
    pub fn locator(&self, css: &str) -> ElementHandle {
        self.locate(LocatorSpec::selector(css))
    }

    /// Resolve a path against the base URL. Absolute URLs pass through.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Navigation`] for a relative path without a base
    /// URL, or a path that does not form a valid URL
    pub fn resolve_url(&self, path: &str) -> SondeoResult<Url> {
        match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url().ok_or_else(|| {
                    SondeoError::navigation(path, "relative path and no base URL configured")
                })?;
                Url::parse(base)
                    .and_then(|base| base.join(path))
                    .map_err(|e| SondeoError::navigation(path, e.to_string()))
            }
            Err(e) => Err(SondeoError::navigation(path, e.to_string())),
        }
    }

    /// Navigate and wait for the load.
    ///
    /// Non-2xx responses are a valid page state; only network-level failures
    /// and the navigation timeout are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Navigation`] or [`SondeoError::Lifecycle`]
    pub async fn goto(&self, path: &str) -> SondeoResult<PageState> {
        let url = self.resolve_url(path)?;
        let span = tracing::info_span!("navigate", context = %self.id, url = %url);
        self.goto_url(url).instrument(span).await
    }

    async fn goto_url(&self, url: Url) -> SondeoResult<PageState> {
        let mut guard = self.page.lock().await;
        let driver = guard.as_mut().ok_or_else(|| {
            SondeoError::lifecycle(format!("navigate used after context {} was released", self.id))
        })?;
        let timeout = self.config.navigation_timeout;
        let state = tokio::time::timeout(timeout, driver.goto(url.as_str(), timeout))
            .await
            .map_err(|_| {
                SondeoError::navigation(
                    url.as_str(),
                    format!("timed out after {}ms", timeout.as_millis()),
                )
            })??;
        tracing::debug!(status = ?state.status, "navigated");
        Ok(state)
    }

    /// Current URL and last response status
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Lifecycle`] after release
    pub async fn page_state(&self) -> SondeoResult<PageState> {
        let guard = self.page.lock().await;
        let driver = guard.as_ref().ok_or_else(|| {
            SondeoError::lifecycle(format!("page used after context {} was released", self.id))
        })?;
        driver.page_state().await
    }

    pub(crate) fn page_slot(&self) -> PageSlot {
        self.page.clone()
    }

    pub(crate) fn shared_config(&self) -> Arc<SessionConfig> {
        self.config.clone()
    }

    /// Whether the page is still live
    pub async fn is_live(&self) -> bool {
        self.page.lock().await.is_some()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(context = %self.id, "test context dropped without release");
        }
    }
}

/// Acquire/release counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Contexts handed out
    pub acquired: u64,
    /// Contexts released
    pub released: u64,
    /// Acquires that failed
    pub failed: u64,
}

impl SessionStats {
    /// Contexts currently live
    #[must_use]
    pub const fn active(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    failed: AtomicU64,
}

/// Creates and tears down isolated test contexts on a browser engine
#[derive(Debug, Clone)]
pub struct SessionManager {
    engine: Arc<dyn BrowserEngine>,
    counters: Arc<Counters>,
}

impl SessionManager {
    /// Create a manager over an engine
    #[must_use]
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Engine name
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Open a new isolated context
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Environment`] if the engine cannot be launched,
    /// [`SondeoError::Config`] if the configuration is invalid
    pub async fn acquire(&self, config: SessionConfig) -> SondeoResult<TestContext> {
        config.validate()?;
        match self.engine.open_context(&config).await {
            Ok(page) => {
                let _ = self.counters.acquired.fetch_add(1, Ordering::SeqCst);
                let id = Uuid::new_v4();
                tracing::debug!(context = %id, engine = self.engine.name(), headless = config.headless, "acquired context");
                Ok(TestContext {
                    id,
                    config: Arc::new(config),
                    page: Arc::new(Mutex::new(Some(page))),
                    released: false,
                })
            }
            Err(e) => {
                let _ = self.counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(error = %e, engine = self.engine.name(), "failed to acquire context");
                Err(e)
            }
        }
    }

    /// Close a context and everything it owns.
    ///
    /// Handles bound to the context fail with [`SondeoError::Lifecycle`]
    /// afterwards, even if closing the page reported an error.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if closing failed
    pub async fn release(&self, mut context: TestContext) -> SondeoResult<()> {
        context.released = true;
        let page = context.page.lock().await.take();
        let _ = self.counters.released.fetch_add(1, Ordering::SeqCst);
        let Some(mut page) = page else {
            return Ok(());
        };
        match page.close().await {
            Ok(()) => {
                tracing::debug!(context = %context.id, "released context");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(context = %context.id, error = %e, "error while closing context");
                Err(e)
            }
        }
    }

    /// Navigate a context (see [`TestContext::goto`])
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Navigation`] or [`SondeoError::Lifecycle`]
    pub async fn navigate(&self, context: &TestContext, path: &str) -> SondeoResult<PageState> {
        context.goto(path).await
    }

    /// Acquire, run `body`, and release on every exit path.
    ///
    /// A panic inside `body` becomes [`SondeoError::Fault`]. The body's error
    /// takes precedence over a release error.
    ///
    /// # Errors
    ///
    /// Returns the acquire error, the body's error, or the release error
    pub async fn run_scoped<F>(&self, config: SessionConfig, body: F) -> SondeoResult<()>
    where
        F: for<'a> FnOnce(&'a TestContext) -> TestBody<'a>,
    {
        let context = self.acquire(config).await?;
        let outcome = AssertUnwindSafe(body(&context))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(SondeoError::Fault {
                    message: panic_message(payload.as_ref()),
                })
            });
        let released = self.release(context).await;
        outcome.and(released)
    }

    /// Counters since creation
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Shut down the engine's browsers
    ///
    /// # Errors
    ///
    /// Returns the engine's shutdown error
    pub async fn shutdown(&self) -> SondeoResult<()> {
        self.engine.shutdown().await
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

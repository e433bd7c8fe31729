//! Sondeo: isolated browser contexts and auto-retrying UI assertions
//!
//! Sondeo (Spanish: "sounding") runs end-to-end UI tests against a browser
//! engine. Each test gets its own browser context, issues locate → act and
//! locate → expect steps, and has its context released whatever the outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SONDEO Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────────────┐    │
//! │   │ TestSuite  │    │ Session    │    │ BrowserEngine      │    │
//! │   │ + Runner   │───►│ Manager    │───►│ chromium | mock    │    │
//! │   └────────────┘    └─────┬──────┘    └─────────┬──────────┘    │
//! │                           │ TestContext         │ PageDriver    │
//! │                     ┌─────▼──────┐    ┌─────────▼──────────┐    │
//! │                     │ Locators & │───►│ poll until holds   │    │
//! │                     │ expect()   │    │ or timeout         │    │
//! │                     └────────────┘    └────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sondeo::prelude::*;
//!
//! let manager = SessionManager::new(Arc::new(ChromiumEngine::new()));
//! let config = SessionConfig::layered([&ConfigLayer::new().with_base_url("https://example.com")])?;
//! manager
//!     .run_scoped(config, |ctx| {
//!         async move {
//!             ctx.goto("/login").await?;
//!             let password = ctx.locator("#id_password");
//!             password.fill("hunter2").await?;
//!             expect(&password).to_have_attribute("type", "password").await?;
//!             Ok(())
//!         }
//!         .boxed()
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod assertion;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod context;
mod driver;
mod harness;
mod locator;
mod matcher;
/// In-memory engine for deterministic tests and demos
pub mod mock;
mod reporter;
mod result;

pub use assertion::condition::{Condition, Observation};
pub use assertion::retry::{poll_until, retry_driver_errors, AssertionOutcome, Polled, RetryConfig};
pub use assertion::{expect, expect_page, ElementExpect, PageExpect};
#[cfg(feature = "browser")]
pub use browser::{ChromiumEngine, ChromiumPage};
pub use config::{
    ConfigLayer, LaunchProfile, SessionConfig, DEFAULT_ACTION_TIMEOUT_MS,
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS,
};
pub use context::{SessionManager, SessionStats, TestBody, TestContext};
pub use driver::{Action, BrowserEngine, ElementRef, ElementState, PageDriver, PageState, ScanKind};
pub use harness::{PlannedTest, Selection, TestCase, TestFilter, TestFn, TestGroup, TestRunner, TestSuite};
pub use locator::{ElementHandle, LocatorKind, LocatorSpec};
pub use matcher::{normalize_whitespace, TextMatcher};
pub use mock::{MockElement, MockEngine, MockPage, MockSite, Reaction};
pub use reporter::{FailureDetail, FailureMode, SuiteReport, TestReport, TestStatus};
pub use result::{SondeoError, SondeoResult};

/// Prelude for writing tests
pub mod prelude {
    pub use super::{
        expect, expect_page, ConfigLayer, Condition, ElementHandle, LocatorSpec, SessionConfig,
        SessionManager, SondeoError, SondeoResult, TestBody, TestCase, TestContext, TestGroup,
        TestRunner, TestSuite, TextMatcher,
    };
    #[cfg(feature = "browser")]
    pub use super::ChromiumEngine;
    pub use super::MockEngine;
    pub use futures::FutureExt;
    pub use std::sync::Arc;
}

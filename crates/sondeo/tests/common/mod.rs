//! Shared fixture site for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sondeo::{
    Action, BrowserEngine, ConfigLayer, ElementRef, ElementState, MockElement, MockEngine, MockPage,
    MockSite, PageDriver, PageState, Reaction, ScanKind, SessionConfig, SessionManager, SondeoError,
    SondeoResult,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BASE: &str = "https://stream.test";

/// Landing page plus a login form with a password toggle and field validation
pub fn site() -> MockSite {
    MockSite::new()
        .with_page(
            "https://stream.test/",
            MockPage::new()
                .with_element(MockElement::heading("hero", "Unlimited films, TV programmes and more"))
                .with_element(MockElement::link("sign-in-link", "Sign In", "/login"))
                .with_element(
                    MockElement::new("banner", "div")
                        .with_text("Offer ends soon")
                        .revealed_after(Duration::from_millis(400)),
                ),
        )
        .with_page(
            "https://stream.test/login",
            MockPage::new()
                .with_element(MockElement::heading("title", "Sign In"))
                .with_element(MockElement::textbox("id_userLoginId", "Email or mobile number"))
                .with_element(MockElement::password("id_password", "Password"))
                .with_element(
                    MockElement::button("id_password_toggle", "Show password")
                        .visible_while_focused(&["id_password", "id_password_toggle"])
                        .on_click(Reaction::ToggleAttribute {
                            target: "id_password".into(),
                            name: "type".into(),
                            values: ["password".into(), "text".into()],
                        }),
                )
                .with_element(MockElement::checkbox("bxid_rememberMe_true", "Remember me", true))
                .with_element(
                    MockElement::button("sign-in", "Sign In")
                        .with_attribute("type", "submit")
                        .on_click(Reaction::RevealIfEmpty {
                            field: "id_userLoginId".into(),
                            target: "email-error".into(),
                        })
                        .on_click(Reaction::RevealIfEmpty {
                            field: "id_password".into(),
                            target: "password-error".into(),
                        })
                        .on_click(Reaction::RevealIfFilled {
                            fields: vec!["id_userLoginId".into(), "id_password".into()],
                            target: "login-alert".into(),
                        }),
                )
                .with_element(
                    MockElement::new("email-error", "div")
                        .with_attribute("data-uia", "login-field+error")
                        .with_text("Please enter a valid email or phone number.")
                        .hidden(),
                )
                .with_element(
                    MockElement::new("password-error", "div")
                        .with_attribute("data-uia", "password-field+error")
                        .with_text("Your password must contain between 4 and 60 characters.")
                        .hidden(),
                )
                .with_element(MockElement::alert(
                    "login-alert",
                    "Incorrect password. Please try again.",
                ))
                .with_element(MockElement::button("disabled-button", "Continue").disabled()),
        )
        .with_page("https://stream.test/gone", MockPage::new().with_status(410))
        .with_unreachable_host("offline.test")
}

pub fn engine() -> Arc<MockEngine> {
    Arc::new(MockEngine::new(site()))
}

pub fn manager(engine: &Arc<MockEngine>) -> SessionManager {
    SessionManager::new(engine.clone())
}

/// Base URL set, short timeouts
pub fn config() -> SessionConfig {
    SessionConfig::layered([&ConfigLayer::new()
        .with_base_url(BASE)
        .with_timeout_ms(500)
        .with_action_timeout_ms(200)
        .with_poll_interval_ms(50)])
    .unwrap()
}

/// Fixture engine whose page reads fail or stall on demand
#[derive(Debug)]
pub struct FlakyEngine {
    inner: Arc<MockEngine>,
    failures: Arc<AtomicU32>,
    stall: Option<Duration>,
}

impl FlakyEngine {
    /// The first `n` reads fail the way a read racing a navigation does
    pub fn failing_reads(n: u32) -> Self {
        Self {
            inner: engine(),
            failures: Arc::new(AtomicU32::new(n)),
            stall: None,
        }
    }

    /// Every read hangs for `delay` before answering
    pub fn stalling_reads(delay: Duration) -> Self {
        Self {
            inner: engine(),
            failures: Arc::new(AtomicU32::new(0)),
            stall: Some(delay),
        }
    }

    pub fn mock(&self) -> &MockEngine {
        &self.inner
    }
}

#[async_trait]
impl BrowserEngine for FlakyEngine {
    async fn open_context(&self, config: &SessionConfig) -> SondeoResult<Box<dyn PageDriver>> {
        let inner = self.inner.open_context(config).await?;
        Ok(Box::new(FlakyPage {
            inner,
            failures: self.failures.clone(),
            stall: self.stall,
        }))
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[derive(Debug)]
struct FlakyPage {
    inner: Box<dyn PageDriver>,
    failures: Arc<AtomicU32>,
    stall: Option<Duration>,
}

impl FlakyPage {
    async fn disturb(&self) -> SondeoResult<()> {
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(SondeoError::driver("Execution context was destroyed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageDriver for FlakyPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> SondeoResult<PageState> {
        self.inner.goto(url, timeout).await
    }

    async fn page_state(&self) -> SondeoResult<PageState> {
        self.disturb().await?;
        self.inner.page_state().await
    }

    async fn scan(&self, kind: &ScanKind) -> SondeoResult<Vec<ElementState>> {
        self.disturb().await?;
        self.inner.scan(kind).await
    }

    async fn perform(&mut self, element: ElementRef, action: &Action) -> SondeoResult<()> {
        self.inner.perform(element, action).await
    }

    async fn close(&mut self) -> SondeoResult<()> {
        self.inner.close().await
    }
}

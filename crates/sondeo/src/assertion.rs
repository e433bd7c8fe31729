//! Playwright-style assertions with auto-retry.
//!
//! ```ignore
//! expect(&ctx.locator("#id_password_toggle")).to_be_hidden().await?;
//! expect(&password).to_have_attribute("type", "text").await?;
//! expect(&remember_me).not().to_be_checked().await?;
//! expect_page(&ctx).to_have_url(TextMatcher::pattern(".*/login")?).await?;
//! ```
//!
//! Each `to_*` call polls until the condition holds or the timeout elapses and
//! returns [`SondeoError::AssertionFailure`] on timeout. [`ElementExpect::poll`]
//! and [`PageExpect::poll`] return the raw [`AssertionOutcome`] instead.

pub mod condition;
pub mod retry;

use crate::config::SessionConfig;
use crate::context::{PageSlot, TestContext};
use crate::locator::ElementHandle;
use crate::matcher::TextMatcher;
use crate::result::{SondeoError, SondeoResult};
use condition::{Condition, Observation};
use retry::{poll_until, retry_driver_errors, AssertionOutcome, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Start an assertion on an element
#[must_use]
pub fn expect(handle: &ElementHandle) -> ElementExpect {
    ElementExpect {
        handle: handle.clone(),
        negated: false,
        timeout: None,
    }
}

/// Start an assertion on a context's page
#[must_use]
pub fn expect_page(context: &TestContext) -> PageExpect {
    PageExpect {
        page: context.page_slot(),
        config: context.shared_config(),
        context_id: context.id(),
        negated: false,
        timeout: None,
    }
}

fn apply(negated: bool, condition: Condition) -> Condition {
    if negated {
        condition.negate()
    } else {
        condition
    }
}

fn into_result(
    outcome: AssertionOutcome,
    condition: &Condition,
    subject: String,
    timeout: Duration,
) -> SondeoResult<AssertionOutcome> {
    match outcome {
        AssertionOutcome::Satisfied { .. } => Ok(outcome),
        AssertionOutcome::TimedOut {
            ref last_observed, ..
        } => Err(SondeoError::AssertionFailure {
            condition: condition.to_string(),
            subject,
            last_observed: last_observed.to_string(),
            timeout,
        }),
    }
}

/// Assertion builder for an element
#[derive(Debug, Clone)]
pub struct ElementExpect {
    handle: ElementHandle,
    negated: bool,
    timeout: Option<Duration>,
}

impl ElementExpect {
    /// Negate the next condition
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Override the context's default timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Poll a condition and return the raw outcome.
    ///
    /// Driver errors during a poll count as a failed observation.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] for a page condition and
    /// [`SondeoError::Lifecycle`] after release; a timeout is reported in the
    /// outcome
    pub async fn poll(&self, condition: &Condition) -> SondeoResult<AssertionOutcome> {
        if condition.is_page_condition() {
            return Err(SondeoError::config(format!(
                "{condition} is a page condition; use expect_page"
            )));
        }
        let config = RetryConfig::for_assertion(self.handle.config(), self.timeout);
        let polled = poll_until(
            config,
            || self.handle.observe(),
            |o| condition.evaluate(o),
            retry_driver_errors,
        )
        .await?;
        Ok(polled.into())
    }

    /// Assert an arbitrary condition
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    #[tracing::instrument(name = "expect", skip(self, condition), fields(locator = %self.handle.spec(), condition = tracing::field::Empty))]
    pub async fn to_satisfy(self, condition: Condition) -> SondeoResult<AssertionOutcome> {
        let condition = apply(self.negated, condition);
        tracing::Span::current().record("condition", tracing::field::display(&condition));
        let timeout = self.timeout.unwrap_or(self.handle.config().timeout);
        let outcome = self.poll(&condition).await?;
        tracing::debug!(
            satisfied = outcome.is_satisfied(),
            attempts = outcome.attempts(),
            elapsed_ms = outcome.elapsed().as_millis() as u64,
            "assertion finished"
        );
        into_result(outcome, &condition, self.handle.spec().to_string(), timeout)
    }

    /// Element is rendered
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_be_visible(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::Visible).await
    }

    /// Element is not rendered or does not exist
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_be_hidden(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::Hidden).await
    }

    /// Element accepts text
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_be_editable(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::Editable).await
    }

    /// Value or text is empty
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_be_empty(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::Empty).await
    }

    /// Checkbox or radio is checked
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_be_checked(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::Checked).await
    }

    /// Attribute is present and matches
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_have_attribute(
        self,
        name: &str,
        value: impl Into<TextMatcher>,
    ) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::attribute(name, value)).await
    }

    /// Text content matches
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_have_text(self, text: impl Into<TextMatcher>) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::TextEquals(text.into())).await
    }
}

/// Assertion builder for a page's navigation state
#[derive(Clone)]
pub struct PageExpect {
    page: PageSlot,
    config: Arc<SessionConfig>,
    context_id: Uuid,
    negated: bool,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for PageExpect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageExpect")
            .field("context_id", &self.context_id)
            .field("negated", &self.negated)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PageExpect {
    /// Negate the next condition
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Override the context's default timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn observe(&self) -> SondeoResult<Observation> {
        let guard = self.page.lock().await;
        let driver = guard.as_ref().ok_or_else(|| {
            SondeoError::lifecycle(format!(
                "page assertion used after context {} was released",
                self.context_id
            ))
        })?;
        Ok(Observation::Page(driver.page_state().await?))
    }

    /// Poll a condition and return the raw outcome
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] for an element condition and
    /// [`SondeoError::Lifecycle`] after release
    pub async fn poll(&self, condition: &Condition) -> SondeoResult<AssertionOutcome> {
        if !condition.is_page_condition() {
            return Err(SondeoError::config(format!(
                "{condition} needs an element; use expect(&locator)"
            )));
        }
        let config = RetryConfig::for_assertion(&self.config, self.timeout);
        let polled = poll_until(
            config,
            || self.observe(),
            |o| condition.evaluate(o),
            retry_driver_errors,
        )
        .await?;
        Ok(polled.into())
    }

    /// Assert an arbitrary page condition
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    #[tracing::instrument(name = "expect", skip(self, condition), fields(context = %self.context_id))]
    pub async fn to_satisfy(self, condition: Condition) -> SondeoResult<AssertionOutcome> {
        let condition = apply(self.negated, condition);
        let timeout = self.timeout.unwrap_or(self.config.timeout);
        let outcome = self.poll(&condition).await?;
        into_result(outcome, &condition, "page".to_string(), timeout)
    }

    /// Current URL matches
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_have_url(self, url: impl Into<TextMatcher>) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::UrlMatches(url.into())).await
    }

    /// Last navigation returned 2xx
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::AssertionFailure`] on timeout
    pub async fn to_have_ok_response(self) -> SondeoResult<AssertionOutcome> {
        self.to_satisfy(Condition::ResponseOk).await
    }
}

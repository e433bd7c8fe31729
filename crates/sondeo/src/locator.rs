//! Locators and element handles.
//!
//! A [`LocatorSpec`] is a pure description. It is resolved against the live DOM
//! on every use and never cached, so a handle survives re-renders and
//! navigations. Locators are strict: more than one match is reported as
//! [`Observation::Ambiguous`] and no condition or action accepts it.

use crate::assertion::condition::Observation;
use crate::assertion::retry::{poll_until, retry_driver_errors, RetryConfig};
use crate::config::SessionConfig;
use crate::context::PageSlot;
use crate::driver::{Action, ElementState, ScanKind};
use crate::matcher::TextMatcher;
use crate::result::{SondeoError, SondeoResult};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// How a locator finds candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorKind {
    /// ARIA role (explicit or implicit)
    Role(String),
    /// Associated `<label>` or `aria-label`
    Label,
    /// Placeholder attribute
    Placeholder,
    /// Text content
    Text,
    /// CSS selector, typically an attribute selector
    Selector(String),
}

/// Description of how to find zero or more elements
#[derive(Debug, Clone)]
pub struct LocatorSpec {
    kind: LocatorKind,
    matcher: Option<TextMatcher>,
}

impl LocatorSpec {
    /// A locator of any kind with no matcher; add one with [`matching`](Self::matching)
    #[must_use]
    pub const fn new(kind: LocatorKind) -> Self {
        Self {
            kind,
            matcher: None,
        }
    }

    /// Elements with an ARIA role
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Role(role.into()),
            matcher: None,
        }
    }

    /// Form controls by label text (case-insensitive substring)
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Label,
            matcher: Some(TextMatcher::contains(text)),
        }
    }

    /// Elements by placeholder (case-insensitive substring)
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Placeholder,
            matcher: Some(TextMatcher::contains(text)),
        }
    }

    /// Elements by text content (case-insensitive substring)
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Text,
            matcher: Some(TextMatcher::contains(text)),
        }
    }

    /// Elements matching a CSS selector
    #[must_use]
    pub fn selector(css: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Selector(css.into()),
            matcher: None,
        }
    }

    /// Disambiguate by accessible name (roles) or text (selectors),
    /// case-insensitive substring
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.matching(TextMatcher::contains(name))
    }

    /// Replace the matcher, e.g. with an exact string or a pattern
    #[must_use]
    pub fn matching(mut self, matcher: impl Into<TextMatcher>) -> Self {
        self.matcher = Some(matcher.into());
        self
    }

    /// Locator kind
    #[must_use]
    pub const fn kind(&self) -> &LocatorKind {
        &self.kind
    }

    /// Candidate set the driver should enumerate
    #[must_use]
    pub fn scan_kind(&self) -> ScanKind {
        match &self.kind {
            LocatorKind::Role(role) => ScanKind::Role(role.clone()),
            LocatorKind::Label => ScanKind::Label,
            LocatorKind::Placeholder => ScanKind::Placeholder,
            LocatorKind::Text => ScanKind::Text,
            LocatorKind::Selector(css) => ScanKind::Css(css.clone()),
        }
    }

    /// Apply the matcher and strictness to a scan result
    #[must_use]
    pub fn select(&self, candidates: Vec<ElementState>) -> Observation {
        let mut matched: Vec<ElementState> = candidates
            .into_iter()
            .filter(|c| self.matcher.as_ref().map_or(true, |m| m.matches(&c.key)))
            .collect();
        match matched.len() {
            0 => Observation::NotFound,
            1 => Observation::Element(matched.remove(0)),
            n => Observation::Ambiguous(n),
        }
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.matcher) {
            (LocatorKind::Role(role), None) => write!(f, "get_by_role({role:?})"),
            (LocatorKind::Role(role), Some(m)) => write!(f, "get_by_role({role:?}, name={m})"),
            (LocatorKind::Label, Some(m)) => write!(f, "get_by_label({m})"),
            (LocatorKind::Placeholder, Some(m)) => write!(f, "get_by_placeholder({m})"),
            (LocatorKind::Text, Some(m)) => write!(f, "get_by_text({m})"),
            (LocatorKind::Label, None) => write!(f, "get_by_label()"),
            (LocatorKind::Placeholder, None) => write!(f, "get_by_placeholder()"),
            (LocatorKind::Text, None) => write!(f, "get_by_text()"),
            (LocatorKind::Selector(css), None) => write!(f, "locator({css:?})"),
            (LocatorKind::Selector(css), Some(m)) => write!(f, "locator({css:?}, has_text={m})"),
        }
    }
}

/// Why an observation cannot take an action
pub(crate) fn actionability(observed: &Observation, action: &Action) -> Result<(), String> {
    let element = match observed {
        Observation::Element(e) => e,
        Observation::NotFound => return Err("no element matches".to_string()),
        Observation::Ambiguous(n) => {
            return Err(format!("strict mode violation, {n} elements match"))
        }
        Observation::Page(_) => return Err("not an element".to_string()),
        Observation::Unavailable(reason) => return Err(reason.clone()),
    };
    if action.needs_pointer() {
        if !element.visible {
            return Err("element is not visible".to_string());
        }
        if !element.enabled {
            return Err("element is not enabled".to_string());
        }
    }
    if action.needs_editable() && !element.editable {
        return Err("element is not editable".to_string());
    }
    Ok(())
}

/// A locator bound to one test context's page.
///
/// Cheap to clone. Every operation re-resolves the locator; once the owning
/// context is released every operation fails with [`SondeoError::Lifecycle`].
#[derive(Clone)]
pub struct ElementHandle {
    spec: LocatorSpec,
    page: PageSlot,
    config: Arc<SessionConfig>,
    context_id: Uuid,
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("spec", &self.spec)
            .field("context_id", &self.context_id)
            .finish()
    }
}

impl ElementHandle {
    pub(crate) const fn new(
        spec: LocatorSpec,
        page: PageSlot,
        config: Arc<SessionConfig>,
        context_id: Uuid,
    ) -> Self {
        Self {
            spec,
            page,
            config,
            context_id,
        }
    }

    /// The locator this handle resolves
    #[must_use]
    pub const fn spec(&self) -> &LocatorSpec {
        &self.spec
    }

    /// Configuration of the owning context
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolve the locator once
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Lifecycle`] after release, or a driver error
    pub async fn observe(&self) -> SondeoResult<Observation> {
        let guard = self.page.lock().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| released(&self.spec, self.context_id))?;
        let candidates = driver.scan(&self.spec.scan_kind()).await?;
        Ok(self.spec.select(candidates))
    }

    /// Click the element
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if the element is not actionable
    pub async fn click(&self) -> SondeoResult<()> {
        self.act(Action::Click).await
    }

    /// Replace the element's value
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if the element is not editable
    pub async fn fill(&self, text: impl Into<String>) -> SondeoResult<()> {
        self.act(Action::Fill(text.into())).await
    }

    /// Focus the element
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if no single element matches
    pub async fn focus(&self) -> SondeoResult<()> {
        self.act(Action::Focus).await
    }

    /// Blur the element
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if no single element matches
    pub async fn blur(&self) -> SondeoResult<()> {
        self.act(Action::Blur).await
    }

    /// Select an option by value
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if the element is not actionable
    pub async fn select_option(&self, value: impl Into<String>) -> SondeoResult<()> {
        self.act(Action::SelectOption(value.into())).await
    }

    /// Wait for actionability, apply the slow-motion delay, then perform.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Interaction`] if the element never became
    /// actionable or the driver rejected the action, [`SondeoError::Lifecycle`]
    /// after release
    #[tracing::instrument(name = "act", skip(self, action), fields(context = %self.context_id, locator = %self.spec, action = %action))]
    pub async fn act(&self, action: Action) -> SondeoResult<()> {
        if !self.config.slow_mo.is_zero() {
            tokio::time::sleep(self.config.slow_mo).await;
        }

        let polled = poll_until(
            RetryConfig::for_action(&self.config),
            || self.observe(),
            |observed| actionability(observed, &action).is_ok(),
            retry_driver_errors,
        )
        .await?;

        if let Err(reason) = actionability(&polled.last, &action) {
            tracing::debug!(%reason, attempts = polled.attempts, "element not actionable");
            return Err(self.interaction_error(&action, reason));
        }
        let Some(element) = polled.last.element().map(|e| e.element) else {
            return Err(self.interaction_error(&action, "no element matches".to_string()));
        };

        let mut guard = self.page.lock().await;
        let driver = guard
            .as_mut()
            .ok_or_else(|| released(&self.spec, self.context_id))?;
        driver
            .perform(element, &action)
            .await
            .map_err(|e| match e {
                SondeoError::Lifecycle { .. } => e,
                other => self.interaction_error(&action, other.to_string()),
            })?;
        tracing::debug!(elapsed_ms = polled.elapsed.as_millis() as u64, "performed");
        Ok(())
    }

    fn interaction_error(&self, action: &Action, reason: String) -> SondeoError {
        SondeoError::Interaction {
            action: action.to_string(),
            locator: self.spec.to_string(),
            reason,
        }
    }
}

fn released(spec: &LocatorSpec, context_id: Uuid) -> SondeoError {
    SondeoError::lifecycle(format!(
        "{spec} used after context {context_id} was released"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ElementRef;

    fn candidate(id: u64, key: &str, visible: bool) -> ElementState {
        ElementState {
            element: ElementRef(id),
            tag: "a".to_string(),
            key: key.to_string(),
            text: key.to_string(),
            visible,
            enabled: true,
            ..ElementState::default()
        }
    }

    mod spec_tests {
        use super::*;

        #[test]
        fn test_role_without_name_matches_all() {
            let spec = LocatorSpec::role("link");
            let obs = spec.select(vec![candidate(1, "Sign In", true), candidate(2, "Help", true)]);
            assert_eq!(obs, Observation::Ambiguous(2));
        }

        #[test]
        fn test_name_disambiguates() {
            let spec = LocatorSpec::role("link").with_name("sign in");
            let obs = spec.select(vec![candidate(1, "Sign In", true), candidate(2, "Help", true)]);
            assert_eq!(obs.element().map(|e| e.element), Some(ElementRef(1)));
        }

        #[test]
        fn test_pattern_matcher() {
            let spec =
                LocatorSpec::role("link").matching(TextMatcher::pattern_ci("^need help").unwrap());
            let obs = spec.select(vec![
                candidate(1, "Need help?", true),
                candidate(2, "I need help", true),
            ]);
            assert_eq!(obs.element().map(|e| e.element), Some(ElementRef(1)));
        }

        #[test]
        fn test_no_candidates_is_not_found() {
            assert_eq!(LocatorSpec::label("Email").select(vec![]), Observation::NotFound);
        }

        #[test]
        fn test_display() {
            assert_eq!(
                LocatorSpec::role("button").with_name("Sign In").to_string(),
                "get_by_role(\"button\", name=~\"sign in\")"
            );
            assert_eq!(
                LocatorSpec::selector("#id_password_toggle").to_string(),
                "locator(\"#id_password_toggle\")"
            );
            assert_eq!(
                LocatorSpec::placeholder("Email").to_string(),
                "get_by_placeholder(~\"email\")"
            );
        }

        #[test]
        fn test_scan_kind() {
            assert_eq!(LocatorSpec::role("link").scan_kind(), ScanKind::Role("link".into()));
            assert_eq!(
                LocatorSpec::selector("[name=password]").scan_kind(),
                ScanKind::Css("[name=password]".into())
            );
        }
    }

    mod actionability_tests {
        use super::*;

        #[test]
        fn test_click_needs_visible() {
            let hidden = Observation::Element(candidate(1, "x", false));
            let reason = actionability(&hidden, &Action::Click).unwrap_err();
            assert_eq!(reason, "element is not visible");
        }

        #[test]
        fn test_focus_accepts_hidden() {
            let hidden = Observation::Element(candidate(1, "x", false));
            assert!(actionability(&hidden, &Action::Focus).is_ok());
        }

        #[test]
        fn test_fill_needs_editable() {
            let link = Observation::Element(candidate(1, "x", true));
            let reason = actionability(&link, &Action::Fill("a".into())).unwrap_err();
            assert_eq!(reason, "element is not editable");
        }

        #[test]
        fn test_ambiguous_is_strict_violation() {
            let reason = actionability(&Observation::Ambiguous(3), &Action::Click).unwrap_err();
            assert!(reason.contains("3 elements"));
        }

        #[test]
        fn test_not_found() {
            assert!(actionability(&Observation::NotFound, &Action::Blur).is_err());
        }
    }
}

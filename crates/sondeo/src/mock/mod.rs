//! In-memory browser engine.
//!
//! [`MockEngine`] serves a [`MockSite`] without a browser process. Every
//! context gets its own copy of each page it loads, so state never leaks
//! between contexts. Pages react to actions (reveal on focus, attribute
//! toggles, navigation, validation on submit, delayed reveal), which is
//! enough to exercise the harness end to end and deterministically.
//!
//! ```ignore
//! let site = MockSite::new().with_page(
//!     "https://example.test/login",
//!     MockPage::new().with_element(MockElement::textbox("email", "Email")),
//! );
//! let manager = SessionManager::new(Arc::new(MockEngine::new(site)));
//! ```

mod site;

pub use site::{MockElement, MockPage, MockSite, Reaction};

use crate::config::SessionConfig;
use crate::driver::{Action, BrowserEngine, ElementRef, ElementState, PageDriver, PageState, ScanKind};
use crate::result::{SondeoError, SondeoResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Engine serving a [`MockSite`]
#[derive(Debug, Clone)]
pub struct MockEngine {
    site: Arc<MockSite>,
    open: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    launch_failure: Option<String>,
    history: Arc<Mutex<Vec<String>>>,
}

impl MockEngine {
    /// Serve a site
    #[must_use]
    pub fn new(site: MockSite) -> Self {
        Self {
            site: Arc::new(site),
            open: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            launch_failure: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An engine whose browser never launches
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let mut engine = Self::new(MockSite::new());
        engine.launch_failure = Some(message.into());
        engine
    }

    /// Contexts opened and not yet closed
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Contexts opened in total
    #[must_use]
    pub fn opened_contexts(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Calls made on any context, in order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Check if a call with this prefix was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.history().iter().any(|call| call.starts_with(prefix))
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn open_context(&self, config: &SessionConfig) -> SondeoResult<Box<dyn PageDriver>> {
        if let Some(ref message) = self.launch_failure {
            return Err(SondeoError::environment(message.clone()));
        }
        let _ = self.opened.fetch_add(1, Ordering::SeqCst);
        let _ = self.open.fetch_add(1, Ordering::SeqCst);
        record(&self.history, format!("open_context:headless={}", config.headless));
        Ok(Box::new(MockPageDriver {
            site: self.site.clone(),
            open: self.open.clone(),
            history: self.history.clone(),
            state: PageState {
                url: "about:blank".to_string(),
                status: None,
            },
            elements: Vec::new(),
            generation: 0,
            loaded_at: Instant::now(),
            focused: None,
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn record(history: &Mutex<Vec<String>>, call: String) {
    if let Ok(mut calls) = history.lock() {
        calls.push(call);
    }
}

/// One context's page on a [`MockEngine`]
#[derive(Debug)]
pub struct MockPageDriver {
    site: Arc<MockSite>,
    open: Arc<AtomicUsize>,
    history: Arc<Mutex<Vec<String>>>,
    state: PageState,
    elements: Vec<MockElement>,
    generation: u32,
    loaded_at: Instant,
    focused: Option<String>,
    closed: bool,
}

impl MockPageDriver {
    fn load(&mut self, url: &str) -> SondeoResult<PageState> {
        let parsed = Url::parse(url).map_err(|e| SondeoError::navigation(url, e.to_string()))?;
        if let Some(host) = parsed.host_str() {
            if self.site.is_unreachable(host) {
                return Err(SondeoError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"));
            }
        }
        let (status, elements) = self
            .site
            .page(parsed.as_str())
            .map_or((404, Vec::new()), |page| (page.status, page.elements.clone()));

        self.generation += 1;
        self.elements = elements;
        self.loaded_at = Instant::now();
        self.focused = None;
        self.state = PageState {
            url: parsed.to_string(),
            status: Some(status),
        };
        record(&self.history, format!("goto:{parsed}"));
        Ok(self.state.clone())
    }

    fn is_rendered(&self, element: &MockElement) -> bool {
        let focus_ok = element.shown_while_focused.is_empty()
            || self
                .focused
                .as_ref()
                .is_some_and(|f| element.shown_while_focused.contains(f));
        let delay_ok = element
            .reveal_after
            .map_or(true, |delay| self.loaded_at.elapsed() >= delay);
        element.visible && focus_ok && delay_ok
    }

    fn snapshot(&self, index: usize, key: &str) -> ElementState {
        let element = &self.elements[index];
        ElementState {
            element: ElementRef((u64::from(self.generation) << 32) | index as u64),
            tag: element.tag.clone(),
            key: key.to_string(),
            text: element.text.clone(),
            value: element.value.clone(),
            attributes: element.attributes.clone(),
            visible: self.is_rendered(element),
            enabled: element.enabled,
            editable: element.editable && element.enabled,
            checked: element.checked,
        }
    }

    fn index_of(&self, element: ElementRef) -> SondeoResult<usize> {
        let generation = (element.0 >> 32) as u32;
        let index = (element.0 & u64::from(u32::MAX)) as usize;
        if generation != self.generation || index >= self.elements.len() {
            return Err(SondeoError::driver("element is not attached to the DOM"));
        }
        Ok(index)
    }

    fn find(&mut self, id: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn value_of(&self, id: &str) -> String {
        self.elements
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.value.clone())
            .unwrap_or_default()
    }

    fn react(&mut self, source: usize, reactions: &[Reaction]) -> SondeoResult<()> {
        for reaction in reactions {
            match reaction {
                Reaction::ToggleAttribute {
                    target,
                    name,
                    values,
                } => {
                    if let Some(el) = self.find(target) {
                        let next = if el.attributes.get(name) == Some(&values[0]) {
                            values[1].clone()
                        } else {
                            values[0].clone()
                        };
                        let _ = el.attributes.insert(name.clone(), next);
                    }
                }
                Reaction::Navigate(href) => {
                    let url = self.join(href)?;
                    let _ = self.load(&url)?;
                    return Ok(());
                }
                Reaction::NavigateToValue => {
                    let value = self.elements[source].value.clone().unwrap_or_default();
                    let url = self.join(&value)?;
                    let _ = self.load(&url)?;
                    return Ok(());
                }
                Reaction::Reveal(target) => {
                    if let Some(el) = self.find(target) {
                        el.visible = true;
                    }
                }
                Reaction::RevealIfEmpty { field, target } => {
                    if self.value_of(field).is_empty() {
                        if let Some(el) = self.find(target) {
                            el.visible = true;
                        }
                    }
                }
                Reaction::RevealIfFilled { fields, target } => {
                    if fields.iter().all(|f| !self.value_of(f).is_empty()) {
                        if let Some(el) = self.find(target) {
                            el.visible = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn join(&self, href: &str) -> SondeoResult<String> {
        Url::parse(&self.state.url)
            .and_then(|base| base.join(href))
            .map(String::from)
            .map_err(|e| SondeoError::navigation(href, e.to_string()))
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> SondeoResult<PageState> {
        self.load(url)
    }

    async fn page_state(&self) -> SondeoResult<PageState> {
        Ok(self.state.clone())
    }

    async fn scan(&self, kind: &ScanKind) -> SondeoResult<Vec<ElementState>> {
        let found = self
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, el)| {
                let key = match kind {
                    ScanKind::Role(role) => (el.role.as_deref() == Some(role.as_str()))
                        .then(|| el.name.clone()),
                    ScanKind::Label => el.label.clone(),
                    ScanKind::Placeholder => el.placeholder.clone(),
                    ScanKind::Text => (!el.text.is_empty()).then(|| el.text.clone()),
                    ScanKind::Css(selector) => {
                        el.matches_selector(selector).then(|| el.text.clone())
                    }
                };
                key.map(|key| self.snapshot(i, &key))
            })
            .collect();
        Ok(found)
    }

    async fn perform(&mut self, element: ElementRef, action: &Action) -> SondeoResult<()> {
        let index = self.index_of(element)?;
        let id = self.elements[index].id.clone();
        record(&self.history, format!("{action}:{id}"));

        match action {
            Action::Click => {
                let el = &mut self.elements[index];
                if let Some(checked) = el.checked {
                    el.checked = Some(!checked);
                }
                if el.is_focusable() {
                    self.focused = Some(id);
                }
                let reactions = self.elements[index].on_click.clone();
                self.react(index, &reactions)
            }
            Action::Fill(text) => {
                self.elements[index].value = Some(text.clone());
                self.focused = Some(id);
                Ok(())
            }
            Action::Focus => {
                self.focused = Some(id);
                Ok(())
            }
            Action::Blur => {
                if self.focused.as_deref() == Some(id.as_str()) {
                    self.focused = None;
                }
                Ok(())
            }
            Action::SelectOption(value) => {
                let el = &mut self.elements[index];
                if !el.options.is_empty() && !el.options.contains(value) {
                    return Err(SondeoError::driver(format!("no option with value {value:?}")));
                }
                el.value = Some(value.clone());
                let reactions = el.on_change.clone();
                self.react(index, &reactions)
            }
        }
    }

    async fn close(&mut self) -> SondeoResult<()> {
        if !self.closed {
            self.closed = true;
            let _ = self.open.fetch_sub(1, Ordering::SeqCst);
            record(&self.history, "close".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "https://example.test/";

    fn site() -> MockSite {
        MockSite::new()
            .with_page(
                HOME,
                MockPage::new()
                    .with_element(MockElement::link("login-link", "Sign In", "/login"))
                    .with_element(
                        MockElement::new("late", "div")
                            .with_text("Loaded")
                            .revealed_after(Duration::from_millis(300)),
                    ),
            )
            .with_page(
                "https://example.test/login",
                MockPage::new()
                    .with_element(MockElement::password("pw", "Password"))
                    .with_element(
                        MockElement::button("toggle", "Show password")
                            .visible_while_focused(&["pw", "toggle"])
                            .on_click(Reaction::ToggleAttribute {
                                target: "pw".into(),
                                name: "type".into(),
                                values: ["password".into(), "text".into()],
                            }),
                    ),
            )
            .with_unreachable_host("nowhere.invalid")
    }

    async fn open(engine: &MockEngine) -> Box<dyn PageDriver> {
        engine.open_context(&SessionConfig::default()).await.unwrap()
    }

    async fn one(page: &dyn PageDriver, kind: ScanKind) -> ElementState {
        let mut found = page.scan(&kind).await.unwrap();
        assert_eq!(found.len(), 1, "{kind:?}");
        found.remove(0)
    }

    mod engine_tests {
        use super::*;

        #[tokio::test]
        async fn test_counts_open_contexts() {
            let engine = MockEngine::new(site());
            let mut a = open(&engine).await;
            let _b = open(&engine).await;
            assert_eq!(engine.open_contexts(), 2);
            a.close().await.unwrap();
            a.close().await.unwrap();
            assert_eq!(engine.open_contexts(), 1);
            assert_eq!(engine.opened_contexts(), 2);
        }

        #[tokio::test]
        async fn test_failing_engine() {
            let engine = MockEngine::failing("chromium not found");
            let err = engine
                .open_context(&SessionConfig::default())
                .await
                .unwrap_err();
            assert!(matches!(err, SondeoError::Environment { .. }));
            assert_eq!(engine.opened_contexts(), 0);
        }
    }

    mod page_tests {
        use super::*;

        #[tokio::test]
        async fn test_blank_before_navigation() {
            let engine = MockEngine::new(site());
            let page = open(&engine).await;
            let state = page.page_state().await.unwrap();
            assert_eq!(state.url, "about:blank");
            assert!(state.status.is_none());
        }

        #[tokio::test]
        async fn test_unknown_page_is_404_not_error() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let state = page
                .goto("https://example.test/missing", Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(state.status, Some(404));
        }

        #[tokio::test]
        async fn test_unreachable_host_is_navigation_error() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let err = page
                .goto("https://nowhere.invalid/", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, SondeoError::Navigation { .. }));
        }

        #[tokio::test]
        async fn test_link_click_navigates() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let _ = page.goto(HOME, Duration::from_secs(1)).await.unwrap();
            let link = one(page.as_ref(), ScanKind::Role("link".into())).await;
            page.perform(link.element, &Action::Click).await.unwrap();
            let state = page.page_state().await.unwrap();
            assert_eq!(state.url, "https://example.test/login");
            assert!(engine.was_called("click:login-link"));
        }

        #[tokio::test]
        async fn test_stale_reference_after_navigation() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let _ = page.goto(HOME, Duration::from_secs(1)).await.unwrap();
            let link = one(page.as_ref(), ScanKind::Role("link".into())).await;
            let _ = page.goto(HOME, Duration::from_secs(1)).await.unwrap();
            let err = page.perform(link.element, &Action::Click).await.unwrap_err();
            assert!(err.to_string().contains("not attached"));
        }

        #[tokio::test]
        async fn test_focus_reveals_and_click_toggles() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let _ = page
                .goto("https://example.test/login", Duration::from_secs(1))
                .await
                .unwrap();
            let toggle = one(page.as_ref(), ScanKind::Css("#toggle".into())).await;
            assert!(!toggle.visible);

            let pw = one(page.as_ref(), ScanKind::Label).await;
            page.perform(pw.element, &Action::Focus).await.unwrap();
            let toggle = one(page.as_ref(), ScanKind::Css("#toggle".into())).await;
            assert!(toggle.visible);

            page.perform(toggle.element, &Action::Click).await.unwrap();
            let pw = one(page.as_ref(), ScanKind::Label).await;
            assert_eq!(pw.attribute("type"), Some("text"));
            let toggle = one(page.as_ref(), ScanKind::Css("#toggle".into())).await;
            assert!(toggle.visible, "toggle keeps itself visible while focused");
        }

        #[tokio::test(start_paused = true)]
        async fn test_delayed_reveal() {
            let engine = MockEngine::new(site());
            let mut page = open(&engine).await;
            let _ = page.goto(HOME, Duration::from_secs(1)).await.unwrap();
            let late = one(page.as_ref(), ScanKind::Css("#late".into())).await;
            assert!(!late.visible);
            tokio::time::sleep(Duration::from_millis(300)).await;
            let late = one(page.as_ref(), ScanKind::Css("#late".into())).await;
            assert!(late.visible);
        }

        #[tokio::test]
        async fn test_contexts_do_not_share_state() {
            let engine = MockEngine::new(site());
            let mut a = open(&engine).await;
            let mut b = open(&engine).await;
            let login = "https://example.test/login";
            let _ = a.goto(login, Duration::from_secs(1)).await.unwrap();
            let _ = b.goto(login, Duration::from_secs(1)).await.unwrap();

            let pw = one(a.as_ref(), ScanKind::Label).await;
            a.perform(pw.element, &Action::Fill("secret".into())).await.unwrap();

            assert_eq!(one(a.as_ref(), ScanKind::Label).await.value.as_deref(), Some("secret"));
            assert_eq!(one(b.as_ref(), ScanKind::Label).await.value.as_deref(), Some(""));
        }
    }
}

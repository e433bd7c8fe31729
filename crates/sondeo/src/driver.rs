//! Browser driver seam.
//!
//! [`BrowserEngine`] opens isolated contexts; each context is driven through a
//! [`PageDriver`]. The session manager and assertion engine only talk to these
//! traits, so the Chromium engine and the in-memory [`MockEngine`](crate::MockEngine)
//! are interchangeable.
//!
//! Drivers stay dumb: they enumerate candidate elements for a [`ScanKind`] and
//! report raw state. Text matching, strictness and condition evaluation happen
//! in Rust on top of the returned [`ElementState`]s.

use crate::config::SessionConfig;
use crate::result::SondeoResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Opaque reference to an element inside one page, issued by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub u64);

/// Snapshot of one candidate element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementState {
    /// Driver-issued reference
    #[serde(rename = "ref")]
    pub element: ElementRef,
    /// Lowercase tag name
    pub tag: String,
    /// Text the locator matcher runs against (accessible name, label,
    /// placeholder or text content, depending on the scan)
    pub key: String,
    /// Text content
    pub text: String,
    /// Form control value, if the element has one
    pub value: Option<String>,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Accepts text input
    pub editable: bool,
    /// Checked state for checkboxes and radios
    pub checked: Option<bool>,
}

impl ElementState {
    /// Empty per `toBeEmpty`: an empty value for controls, no text otherwise
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value
            .as_ref()
            .map_or_else(|| self.text.trim().is_empty(), String::is_empty)
    }

    /// Attribute lookup
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for key in ["id", "type", "name", "role", "data-uia"] {
            if let Some(v) = self.attributes.get(key) {
                write!(f, " {key}={v:?}")?;
            }
        }
        write!(
            f,
            "> {} {}",
            if self.visible { "visible" } else { "hidden" },
            if self.enabled { "enabled" } else { "disabled" }
        )?;
        if self.editable {
            write!(f, " editable")?;
        }
        if let Some(checked) = self.checked {
            write!(f, " checked={checked}")?;
        }
        if let Some(ref value) = self.value {
            write!(f, " value={value:?}")?;
        } else if !self.text.is_empty() {
            write!(f, " text={:?}", crate::matcher::normalize_whitespace(&self.text))?;
        }
        Ok(())
    }
}

/// Navigation state of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    /// Current URL
    pub url: String,
    /// HTTP status of the last navigation response (None before any navigation
    /// or when the engine could not observe it)
    pub status: Option<u16>,
}

impl PageState {
    /// Last navigation returned a 2xx status
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "url={:?} status={status}", self.url),
            None => write!(f, "url={:?} status=none", self.url),
        }
    }
}

/// Which candidate set a driver enumerates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanKind {
    /// Elements with an explicit or implicit ARIA role; key = accessible name
    Role(String),
    /// Labelled form controls; key = label text
    Label,
    /// Elements with a placeholder attribute; key = placeholder
    Placeholder,
    /// Elements with own text; key = text content
    Text,
    /// CSS selector matches; key = text content
    Css(String),
}

/// A simulated user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Mouse click at the element's center
    Click,
    /// Replace the control's value with text
    Fill(String),
    /// Move focus to the element
    Focus,
    /// Remove focus from the element
    Blur,
    /// Select an `<option>` by value
    SelectOption(String),
}

impl Action {
    /// Whether the element must be visible and enabled first
    #[must_use]
    pub const fn needs_pointer(&self) -> bool {
        matches!(self, Self::Click | Self::Fill(_) | Self::SelectOption(_))
    }

    /// Whether the element must accept text
    #[must_use]
    pub const fn needs_editable(&self) -> bool {
        matches!(self, Self::Fill(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(text) => write!(f, "fill {text:?}"),
            Self::Focus => write!(f, "focus"),
            Self::Blur => write!(f, "blur"),
            Self::SelectOption(value) => write!(f, "select option {value:?}"),
        }
    }
}

/// One page inside one isolated browser context
#[async_trait]
pub trait PageDriver: Send + Sync + fmt::Debug {
    /// Navigate and wait for the load; returns the resulting page state.
    /// Network/DNS failures are errors, HTTP error statuses are not.
    async fn goto(&mut self, url: &str, timeout: Duration) -> SondeoResult<PageState>;

    /// Current URL and last response status
    async fn page_state(&self) -> SondeoResult<PageState>;

    /// Enumerate candidates for a scan, in document order
    async fn scan(&self, kind: &ScanKind) -> SondeoResult<Vec<ElementState>>;

    /// Perform an action on a previously scanned element
    async fn perform(&mut self, element: ElementRef, action: &Action) -> SondeoResult<()>;

    /// Close the page and dispose of its browser context
    async fn close(&mut self) -> SondeoResult<()>;
}

/// Something that can open isolated browser contexts
#[async_trait]
pub trait BrowserEngine: Send + Sync + fmt::Debug {
    /// Open a fresh context with one blank page
    async fn open_context(&self, config: &SessionConfig) -> SondeoResult<Box<dyn PageDriver>>;

    /// Shut down any browser processes the engine owns
    async fn shutdown(&self) -> SondeoResult<()> {
        Ok(())
    }

    /// Engine name for logs and reports
    fn name(&self) -> &'static str;
}

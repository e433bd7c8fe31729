//! In-memory site model served by the mock engine.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Something the page does in response to a user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Flip an attribute of `target` between two values
    ToggleAttribute {
        /// Element id
        target: String,
        /// Attribute name
        name: String,
        /// The two values
        values: [String; 2],
    },
    /// Navigate to a URL, resolved against the current one
    Navigate(String),
    /// Navigate to the acting element's value (language selectors)
    NavigateToValue,
    /// Show an element
    Reveal(String),
    /// Show `target` if the `field` control is empty
    RevealIfEmpty {
        /// Field id
        field: String,
        /// Element id to show
        target: String,
    },
    /// Show `target` if every field is filled
    RevealIfFilled {
        /// Field ids
        fields: Vec<String>,
        /// Element id to show
        target: String,
    },
}

/// An element of a mock page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Element id, also exposed as the `id` attribute
    pub id: String,
    /// Tag name
    pub tag: String,
    /// ARIA role
    pub role: Option<String>,
    /// Accessible name
    pub name: String,
    /// Label text
    pub label: Option<String>,
    /// Placeholder
    pub placeholder: Option<String>,
    /// Text content
    pub text: String,
    /// Control value
    pub value: Option<String>,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Rendered
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Accepts text
    pub editable: bool,
    /// Checkbox state
    pub checked: Option<bool>,
    /// Select options
    pub options: Vec<String>,
    /// Only rendered while one of these ids has focus
    pub shown_while_focused: Vec<String>,
    /// Only rendered once this long has passed since the page loaded
    pub reveal_after: Option<Duration>,
    /// Reactions to a click
    pub on_click: Vec<Reaction>,
    /// Reactions to a selected option
    pub on_change: Vec<Reaction>,
}

impl MockElement {
    /// A visible, enabled element with no role
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        let id = id.into();
        let mut attributes = BTreeMap::new();
        let _ = attributes.insert("id".to_string(), id.clone());
        Self {
            id,
            tag: tag.into(),
            role: None,
            name: String::new(),
            label: None,
            placeholder: None,
            text: String::new(),
            value: None,
            attributes,
            visible: true,
            enabled: true,
            editable: false,
            checked: None,
            options: Vec::new(),
            shown_while_focused: Vec::new(),
            reveal_after: None,
            on_click: Vec::new(),
            on_change: Vec::new(),
        }
    }

    /// `<a href>` with the link role
    #[must_use]
    pub fn link(id: impl Into<String>, name: &str, href: &str) -> Self {
        Self::new(id, "a")
            .with_role("link")
            .with_name(name)
            .with_text(name)
            .with_attribute("href", href)
            .on_click(Reaction::Navigate(href.to_string()))
    }

    /// `<button>`
    #[must_use]
    pub fn button(id: impl Into<String>, name: &str) -> Self {
        Self::new(id, "button")
            .with_role("button")
            .with_name(name)
            .with_text(name)
    }

    /// Labelled text input with the textbox role
    #[must_use]
    pub fn textbox(id: impl Into<String>, label: &str) -> Self {
        Self::input(id, "text", label).with_role("textbox")
    }

    /// Labelled password input (no ARIA role)
    #[must_use]
    pub fn password(id: impl Into<String>, label: &str) -> Self {
        Self::input(id, "password", label)
    }

    fn input(id: impl Into<String>, kind: &str, label: &str) -> Self {
        let mut element = Self::new(id, "input")
            .with_attribute("type", kind)
            .with_label(label)
            .with_name(label);
        element.value = Some(String::new());
        element.editable = true;
        element
    }

    /// Labelled checkbox
    #[must_use]
    pub fn checkbox(id: impl Into<String>, label: &str, checked: bool) -> Self {
        let mut element = Self::new(id, "input")
            .with_role("checkbox")
            .with_attribute("type", "checkbox")
            .with_label(label)
            .with_name(label);
        element.checked = Some(checked);
        element
    }

    /// `<select>` with option values; the first option starts selected
    #[must_use]
    pub fn combobox(id: impl Into<String>, label: &str, options: &[&str]) -> Self {
        let mut element = Self::new(id, "select")
            .with_role("combobox")
            .with_label(label)
            .with_name(label);
        element.options = options.iter().map(|o| (*o).to_string()).collect();
        element.value = Some(options.first().map(|o| (*o).to_string()).unwrap_or_default());
        element
    }

    /// Heading with text
    #[must_use]
    pub fn heading(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, "h1")
            .with_role("heading")
            .with_name(text)
            .with_text(text)
    }

    /// Hidden alert, shown by a reaction
    #[must_use]
    pub fn alert(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, "div")
            .with_role("alert")
            .with_name(text)
            .with_text(text)
            .hidden()
    }

    /// Set the ARIA role
    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Set the accessible name
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the label
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Set the placeholder (also as an attribute)
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self.with_attribute("placeholder", placeholder)
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        let _ = self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Not rendered until revealed
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Only rendered while one of `ids` has focus
    #[must_use]
    pub fn visible_while_focused(mut self, ids: &[&str]) -> Self {
        self.shown_while_focused = ids.iter().map(|id| (*id).to_string()).collect();
        self
    }

    /// Only rendered after a delay from page load
    #[must_use]
    pub fn revealed_after(mut self, delay: Duration) -> Self {
        self.reveal_after = Some(delay);
        self
    }

    /// Add a click reaction
    #[must_use]
    pub fn on_click(mut self, reaction: Reaction) -> Self {
        self.on_click.push(reaction);
        self
    }

    /// Add a select reaction
    #[must_use]
    pub fn on_change(mut self, reaction: Reaction) -> Self {
        self.on_change.push(reaction);
        self
    }

    pub(crate) fn is_focusable(&self) -> bool {
        matches!(self.tag.as_str(), "a" | "button" | "input" | "select" | "textarea")
    }

    /// Minimal CSS matching: `tag`, `#id`, `[attr]`, `[attr=value]`,
    /// `[attr="value"]`, compounds of those and comma-separated lists
    #[must_use]
    pub fn matches_selector(&self, selector: &str) -> bool {
        selector
            .split(',')
            .map(str::trim)
            .any(|simple| !simple.is_empty() && self.matches_compound(simple))
    }

    fn matches_compound(&self, selector: &str) -> bool {
        let mut rest = selector;
        let tag_end = rest.find(['#', '[']).unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(&self.tag) {
            return false;
        }
        rest = &rest[tag_end..];

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('#') {
                let end = after.find(['#', '[']).unwrap_or(after.len());
                if after[..end] != self.id {
                    return false;
                }
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let Some(end) = after.find(']') else {
                    return false;
                };
                if !self.matches_attribute(&after[..end]) {
                    return false;
                }
                rest = &after[end + 1..];
            } else {
                return false;
            }
        }
        true
    }

    fn matches_attribute(&self, body: &str) -> bool {
        match body.split_once('=') {
            None => self.attributes.contains_key(body.trim()),
            Some((name, value)) => {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                self.attributes.get(name.trim()).is_some_and(|v| v == value)
            }
        }
    }
}

/// One page of a mock site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPage {
    /// HTTP status returned for the page
    pub status: u16,
    /// Elements in document order
    pub elements: Vec<MockElement>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// An empty 200 page
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: 200,
            elements: Vec::new(),
        }
    }

    /// Set the response status
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append an element
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// A set of pages keyed by URL, plus hosts that fail to resolve
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockSite {
    pages: BTreeMap<String, MockPage>,
    unreachable: BTreeSet<String>,
}

impl MockSite {
    /// Empty site
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a page at a URL
    #[must_use]
    pub fn with_page(mut self, url: &str, page: MockPage) -> Self {
        let _ = self.pages.insert(normalize(url), page);
        self
    }

    /// Make a host fail DNS resolution
    #[must_use]
    pub fn with_unreachable_host(mut self, host: &str) -> Self {
        let _ = self.unreachable.insert(host.to_string());
        self
    }

    /// Page served at a URL
    #[must_use]
    pub fn page(&self, url: &str) -> Option<&MockPage> {
        self.pages.get(&normalize(url))
    }

    /// Whether a host fails to resolve
    #[must_use]
    pub fn is_unreachable(&self, host: &str) -> bool {
        self.unreachable.contains(host)
    }

    /// Number of pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the site has no pages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

pub(crate) fn normalize(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_string(), String::from)
}

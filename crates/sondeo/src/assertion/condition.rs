//! Conditions and what a single poll observed.

use crate::driver::{ElementState, PageState};
use crate::matcher::TextMatcher;
use std::fmt;

/// Result of resolving a locator or reading page state once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// No element matched
    NotFound,
    /// More than one element matched a strict locator
    Ambiguous(usize),
    /// Exactly one element matched
    Element(ElementState),
    /// Navigation state of the page
    Page(PageState),
    /// The page could not be read this time (navigation in flight, slow driver)
    Unavailable(String),
}

impl Observation {
    /// The matched element, if exactly one matched
    #[must_use]
    pub const fn element(&self) -> Option<&ElementState> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no matching element"),
            Self::Ambiguous(n) => write!(f, "{n} matching elements (strict mode)"),
            Self::Element(e) => write!(f, "{e}"),
            Self::Page(p) => write!(f, "{p}"),
            Self::Unavailable(reason) => write!(f, "page unavailable ({reason})"),
        }
    }
}

/// A predicate over an [`Observation`]
#[derive(Debug, Clone)]
pub enum Condition {
    /// Element is rendered
    Visible,
    /// Element is not rendered, or does not exist
    Hidden,
    /// Element is enabled and accepts text
    Editable,
    /// Control value (or text) is empty
    Empty,
    /// Checkbox or radio is checked
    Checked,
    /// Attribute is present and matches
    AttributeEquals {
        /// Attribute name
        name: String,
        /// Expected value
        value: TextMatcher,
    },
    /// Text content matches
    TextEquals(TextMatcher),
    /// Page URL matches
    UrlMatches(TextMatcher),
    /// Last navigation returned a 2xx status
    ResponseOk,
    /// Negation
    Not(Box<Condition>),
}

impl Condition {
    /// Attribute condition
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<TextMatcher>) -> Self {
        Self::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Negate, collapsing double negation
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Whether this condition reads page state rather than an element
    #[must_use]
    pub fn is_page_condition(&self) -> bool {
        match self {
            Self::UrlMatches(_) | Self::ResponseOk => true,
            Self::Not(inner) => inner.is_page_condition(),
            _ => false,
        }
    }

    /// Evaluate against one observation.
    ///
    /// An ambiguous or unavailable observation fails every condition,
    /// negated or not.
    #[must_use]
    pub fn evaluate(&self, observed: &Observation) -> bool {
        if matches!(observed, Observation::Ambiguous(_) | Observation::Unavailable(_)) {
            return false;
        }
        self.holds(observed)
    }

    fn holds(&self, observed: &Observation) -> bool {
        match (self, observed) {
            (Self::Not(inner), _) => !inner.holds(observed),
            (Self::Hidden, Observation::NotFound) => true,
            (Self::Hidden, Observation::Element(e)) => !e.visible,
            (Self::Visible, Observation::Element(e)) => e.visible,
            (Self::Editable, Observation::Element(e)) => e.editable && e.enabled,
            (Self::Empty, Observation::Element(e)) => e.is_empty(),
            (Self::Checked, Observation::Element(e)) => e.checked == Some(true),
            (Self::AttributeEquals { name, value }, Observation::Element(e)) => {
                e.attribute(name).is_some_and(|v| value.matches(v))
            }
            (Self::TextEquals(m), Observation::Element(e)) => m.matches(&e.text),
            (Self::UrlMatches(m), Observation::Page(p)) => m.matches(&p.url),
            (Self::ResponseOk, Observation::Page(p)) => p.is_ok(),
            _ => false,
        }
    }

    fn describe_positive(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible => write!(f, "be visible"),
            Self::Hidden => write!(f, "be hidden"),
            Self::Editable => write!(f, "be editable"),
            Self::Empty => write!(f, "be empty"),
            Self::Checked => write!(f, "be checked"),
            Self::AttributeEquals { name, value } => write!(f, "have attribute {name}={value}"),
            Self::TextEquals(m) => write!(f, "have text {m}"),
            Self::UrlMatches(m) => write!(f, "have URL {m}"),
            Self::ResponseOk => write!(f, "have an OK response"),
            Self::Not(inner) => inner.describe_positive(f),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not(inner) => {
                write!(f, "not to ")?;
                inner.describe_positive(f)
            }
            other => {
                write!(f, "to ")?;
                other.describe_positive(f)
            }
        }
    }
}

//! Text matching for locators and conditions.

use crate::result::{SondeoError, SondeoResult};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// How a piece of page text is compared.
///
/// All variants compare against whitespace-normalized text: runs of
/// whitespace collapse to one space and the ends are trimmed.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// Whole-string equality
    Exact(String),
    /// Case-insensitive substring
    Contains(String),
    /// Regular expression search
    Pattern(Regex),
}

impl TextMatcher {
    /// Whole-string equality
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(normalize_whitespace(&text.into()))
    }

    /// Case-insensitive substring
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(normalize_whitespace(&text.into()).to_lowercase())
    }

    /// Regular expression, case-sensitive
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] if the pattern does not compile
    pub fn pattern(source: &str) -> SondeoResult<Self> {
        Self::build(source, false)
    }

    /// Regular expression, case-insensitive (the `/.../i` form)
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] if the pattern does not compile
    pub fn pattern_ci(source: &str) -> SondeoResult<Self> {
        Self::build(source, true)
    }

    fn build(source: &str, case_insensitive: bool) -> SondeoResult<Self> {
        RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()
            .map(Self::Pattern)
            .map_err(|e| SondeoError::config(format!("invalid pattern /{source}/: {e}")))
    }

    /// Test a piece of text
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        match self {
            Self::Exact(expected) => text == *expected,
            Self::Contains(needle) => text.to_lowercase().contains(needle.as_str()),
            Self::Pattern(re) => re.is_match(&text),
        }
    }
}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "{s:?}"),
            Self::Contains(s) => write!(f, "~{s:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for TextMatcher {
    fn from(value: &str) -> Self {
        Self::exact(value)
    }
}

impl From<String> for TextMatcher {
    fn from(value: String) -> Self {
        Self::exact(value)
    }
}

impl From<Regex> for TextMatcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

/// Collapse whitespace runs and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod matcher_tests {
        use super::*;

        #[test]
        fn test_exact_ignores_surrounding_whitespace() {
            let m = TextMatcher::exact("Unlimited movies, TV shows, and more.");
            assert!(m.matches("  Unlimited movies,\n TV shows, and more. "));
            assert!(!m.matches("Unlimited movies"));
        }

        #[test]
        fn test_exact_is_case_sensitive() {
            assert!(!TextMatcher::exact("Sign In").matches("sign in"));
        }

        #[test]
        fn test_contains_is_case_insensitive() {
            let m = TextMatcher::contains("Remember Me");
            assert!(m.matches("remember me on this device"));
            assert!(!m.matches("forget me"));
        }

        #[test]
        fn test_pattern_ci() {
            let m = TextMatcher::pattern_ci("sign in").unwrap();
            assert!(m.matches("Sign In"));
            assert!(m.matches("SIGN IN NOW"));
        }

        #[test]
        fn test_url_pattern() {
            let m = TextMatcher::pattern(r".*us-es/login").unwrap();
            assert!(m.matches("https://www.netflix.com/us-es/login"));
            assert!(!m.matches("https://www.netflix.com/login"));
        }

        #[test]
        fn test_invalid_pattern() {
            let err = TextMatcher::pattern("(unclosed").unwrap_err();
            assert!(matches!(err, SondeoError::Config { .. }));
        }

        #[test]
        fn test_display() {
            assert_eq!(TextMatcher::exact("a").to_string(), "\"a\"");
            assert_eq!(TextMatcher::pattern("a.*").unwrap().to_string(), "/a.*/");
        }

        #[test]
        fn test_from_str_is_exact() {
            assert!(matches!(TextMatcher::from("password"), TextMatcher::Exact(_)));
        }
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC{0,40}") {
            let once = normalize_whitespace(&s);
            prop_assert_eq!(normalize_whitespace(&once), once.clone());
        }

        #[test]
        fn prop_exact_matches_padded_self(s in "[a-zA-Z0-9 ]{0,30}", pad in " {0,4}") {
            let padded = format!("{pad}{s}{pad}");
            prop_assert!(TextMatcher::exact(s.as_str()).matches(&padded));
        }

        #[test]
        fn prop_contains_matches_any_case(s in "[a-zA-Z]{1,20}") {
            prop_assert!(TextMatcher::contains(s.to_uppercase()).matches(&s.to_lowercase()));
        }
    }
}

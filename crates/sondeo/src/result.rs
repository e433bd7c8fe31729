//! Result and error types for Sondeo.

use std::time::Duration;
use thiserror::Error;

/// Result type for Sondeo operations
pub type SondeoResult<T> = Result<T, SondeoError>;

/// Errors that can occur while running a UI test.
///
/// Every variant is recovered at the single-test boundary: the runner turns it
/// into a failed [`TestReport`](crate::TestReport) and keeps going.
#[derive(Debug, Error)]
pub enum SondeoError {
    /// The browser engine could not be launched or a context could not be opened
    #[error("Environment error: {message}")]
    Environment {
        /// Error message
        message: String,
    },

    /// Network or DNS level failure reaching a URL
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Target element was not actionable within the actionability wait
    #[error("Cannot {action} {locator}: {reason}")]
    Interaction {
        /// Action attempted (e.g. `click`, `fill "bad@email.com"`)
        action: String,
        /// Locator description
        locator: String,
        /// Why the element was not actionable
        reason: String,
    },

    /// Condition never held within its timeout
    #[error(
        "Expected {subject} {condition} within {}ms, last observed: {last_observed}",
        timeout.as_millis()
    )]
    AssertionFailure {
        /// Condition description
        condition: String,
        /// Locator or page description
        subject: String,
        /// Last observed state
        last_observed: String,
        /// Timeout budget that elapsed
        timeout: Duration,
    },

    /// Page handle used outside of its context's lifetime
    #[error("Lifecycle error: {message}")]
    Lifecycle {
        /// Error message
        message: String,
    },

    /// Test body panicked
    #[error("Test body panicked: {message}")]
    Fault {
        /// Panic payload
        message: String,
    },

    /// Browser protocol error outside the categories above
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Invalid configuration or locator
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SondeoError {
    /// Create an environment error
    #[must_use]
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a lifecycle error
    #[must_use]
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short category name used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Environment { .. } => "environment",
            Self::Navigation { .. } => "navigation",
            Self::Interaction { .. } => "interaction",
            Self::AssertionFailure { .. } => "assertion",
            Self::Lifecycle { .. } => "lifecycle",
            Self::Fault { .. } => "fault",
            Self::Driver { .. } => "driver",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }
}

//! Layered session configuration.
//!
//! A [`SessionConfig`] is never mutated process-wide. It is built by applying
//! [`ConfigLayer`]s in order of increasing precedence:
//!
//! ```text
//! defaults < config file < suite < group (describe) < test < CLI overrides
//! ```
//!
//! Each layer only carries the options it sets; unset options fall through to
//! the layer below.

use crate::result::{SondeoError, SondeoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-assertion timeout (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default actionability wait before an action gives up (2 seconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 2000;

/// Default polling interval for assertions and actionability (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default navigation timeout (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Fully resolved configuration handed to [`SessionManager::acquire`](crate::SessionManager::acquire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Run the browser without a window
    pub headless: bool,
    /// Delay applied before every simulated user action
    pub slow_mo: Duration,
    /// Default timeout for `expect`
    pub timeout: Duration,
    /// Actionability wait for `act`
    pub action_timeout: Duration,
    /// Interval between polls
    pub poll_interval: Duration,
    /// Navigation timeout
    pub navigation_timeout: Duration,
    /// Base URL for relative navigation
    pub base_url: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            slow_mo: Duration::ZERO,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            action_timeout: Duration::from_millis(DEFAULT_ACTION_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            base_url: None,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl SessionConfig {
    /// Build a configuration by applying layers over the defaults, lowest
    /// precedence first.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] if the result fails validation.
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a ConfigLayer>) -> SondeoResult<Self> {
        let mut config = Self::default();
        for layer in layers {
            config.apply(layer);
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply the options a layer sets
    pub fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(headless) = layer.headless {
            self.headless = headless;
        }
        if let Some(ms) = layer.slow_mo_ms {
            self.slow_mo = Duration::from_millis(ms);
        }
        if let Some(ms) = layer.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = layer.action_timeout_ms {
            self.action_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = layer.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = layer.navigation_timeout_ms {
            self.navigation_timeout = Duration::from_millis(ms);
        }
        if let Some(ref url) = layer.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(width) = layer.viewport_width {
            self.viewport_width = width;
        }
        if let Some(height) = layer.viewport_height {
            self.viewport_height = height;
        }
        if let Some(ref path) = layer.chromium_path {
            self.chromium_path = Some(path.clone());
        }
        if let Some(sandbox) = layer.sandbox {
            self.sandbox = sandbox;
        }
    }

    /// Check option combinations that would make polling or navigation meaningless
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] describing the first invalid option.
    pub fn validate(&self) -> SondeoResult<()> {
        if self.poll_interval.is_zero() {
            return Err(SondeoError::config("poll_interval_ms must be greater than 0"));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(SondeoError::config("viewport dimensions must be non-zero"));
        }
        if let Some(ref base) = self.base_url {
            url::Url::parse(base)
                .map_err(|e| SondeoError::config(format!("invalid base_url {base:?}: {e}")))?;
        }
        Ok(())
    }

    /// Options that require a distinct browser process
    #[must_use]
    pub fn launch_profile(&self) -> LaunchProfile {
        LaunchProfile {
            headless: self.headless,
            chromium_path: self.chromium_path.clone(),
            sandbox: self.sandbox,
        }
    }

    /// Express this configuration as a fully populated layer (for display)
    #[must_use]
    pub fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            headless: Some(self.headless),
            slow_mo_ms: Some(self.slow_mo.as_millis() as u64),
            timeout_ms: Some(self.timeout.as_millis() as u64),
            action_timeout_ms: Some(self.action_timeout.as_millis() as u64),
            poll_interval_ms: Some(self.poll_interval.as_millis() as u64),
            navigation_timeout_ms: Some(self.navigation_timeout.as_millis() as u64),
            base_url: self.base_url.clone(),
            viewport_width: Some(self.viewport_width),
            viewport_height: Some(self.viewport_height),
            chromium_path: self.chromium_path.clone(),
            sandbox: Some(self.sandbox),
        }
    }
}

/// Browser process options. Contexts with equal profiles share a browser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaunchProfile {
    /// Headless mode
    pub headless: bool,
    /// Executable override
    pub chromium_path: Option<String>,
    /// Sandbox mode
    pub sandbox: bool,
}

/// A partial configuration. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// Headless mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    /// Slow-motion delay in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_mo_ms: Option<u64>,
    /// Default assertion timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Actionability wait in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_timeout_ms: Option<u64>,
    /// Poll interval in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Navigation timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_ms: Option<u64>,
    /// Base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Viewport width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<u32>,
    /// Viewport height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<u32>,
    /// Chromium executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromium_path: Option<String>,
    /// Sandbox mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
}

impl ConfigLayer {
    /// Create an empty layer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a layer from YAML
    ///
    /// # Errors
    ///
    /// Returns error on malformed YAML or unknown keys
    pub fn from_yaml(source: &str) -> SondeoResult<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(source)?)
    }

    /// Load a layer from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> SondeoResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /// Render as YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> SondeoResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Combine two layers; options set in `over` win
    #[must_use]
    pub fn merged(&self, over: &Self) -> Self {
        Self {
            headless: over.headless.or(self.headless),
            slow_mo_ms: over.slow_mo_ms.or(self.slow_mo_ms),
            timeout_ms: over.timeout_ms.or(self.timeout_ms),
            action_timeout_ms: over.action_timeout_ms.or(self.action_timeout_ms),
            poll_interval_ms: over.poll_interval_ms.or(self.poll_interval_ms),
            navigation_timeout_ms: over.navigation_timeout_ms.or(self.navigation_timeout_ms),
            base_url: over.base_url.clone().or_else(|| self.base_url.clone()),
            viewport_width: over.viewport_width.or(self.viewport_width),
            viewport_height: over.viewport_height.or(self.viewport_height),
            chromium_path: over
                .chromium_path
                .clone()
                .or_else(|| self.chromium_path.clone()),
            sandbox: over.sandbox.or(self.sandbox),
        }
    }

    /// True when the layer sets nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Set slow-motion delay
    #[must_use]
    pub const fn with_slow_mo_ms(mut self, ms: u64) -> Self {
        self.slow_mo_ms = Some(ms);
        self
    }

    /// Set default assertion timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set actionability wait
    #[must_use]
    pub const fn with_action_timeout_ms(mut self, ms: u64) -> Self {
        self.action_timeout_ms = Some(ms);
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = Some(false);
        self
    }
}

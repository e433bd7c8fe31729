//! CLI configuration

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use sondeo::ConfigLayer;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sondeo.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
    /// Trace - protocol-level output
    Trace,
}

impl Verbosity {
    /// From `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug | Self::Trace)
    }

    /// Default log filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "sondeo=info,sondeo_cli=info,warn",
            Self::Debug => "sondeo=debug,sondeo_cli=debug,info",
            Self::Trace => "trace",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// JSON log lines
    pub log_json: bool,
    /// Concurrent tests (0 = auto-detect)
    pub workers: usize,
    /// Skip remaining tests after the first failure
    pub fail_fast: bool,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }

    /// Set concurrent tests
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set fail fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Get effective number of concurrent tests
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        }
    }
}

/// Load the config-file layer.
///
/// An explicit path must exist; without one, `sondeo.yaml` in `dir` is used
/// when present and an empty layer otherwise.
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or malformed
pub fn load_file_layer(explicit: Option<&Path>, dir: &Path) -> CliResult<ConfigLayer> {
    let path: PathBuf = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let candidate = dir.join(DEFAULT_CONFIG_FILE);
            if !candidate.exists() {
                return Ok(ConfigLayer::default());
            }
            candidate
        }
    };
    tracing::debug!(path = %path.display(), "loading config file");
    ConfigLayer::load(&path)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(false, 7), Verbosity::Trace);
        }

        #[test]
        fn test_is_verbose() {
            assert!(!Verbosity::Quiet.is_verbose());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Trace.is_verbose());
        }

        #[test]
        fn test_log_filter_parses() {
            for v in [
                Verbosity::Quiet,
                Verbosity::Normal,
                Verbosity::Verbose,
                Verbosity::Debug,
                Verbosity::Trace,
            ] {
                assert!(tracing_subscriber::EnvFilter::try_new(v.log_filter()).is_ok());
            }
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_default_color() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }

        #[test]
        fn test_should_color() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_chained_builders() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Verbose)
                .with_color(ColorChoice::Never)
                .with_log_json(true)
                .with_workers(2)
                .with_fail_fast(true);

            assert_eq!(config.verbosity, Verbosity::Verbose);
            assert_eq!(config.color, ColorChoice::Never);
            assert!(config.log_json);
            assert_eq!(config.effective_workers(), 2);
            assert!(config.fail_fast);
        }

        #[test]
        fn test_effective_workers_auto() {
            assert!(CliConfig::new().effective_workers() >= 1);
        }
    }

    mod file_layer_tests {
        use super::*;

        #[test]
        fn test_missing_default_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let layer = load_file_layer(None, dir.path()).unwrap();
            assert!(layer.is_empty());
        }

        #[test]
        fn test_default_file_is_loaded() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join(DEFAULT_CONFIG_FILE),
                "base_url: https://staging.example.com\ntimeout_ms: 8000\n",
            )
            .unwrap();
            let layer = load_file_layer(None, dir.path()).unwrap();
            assert_eq!(layer.base_url.as_deref(), Some("https://staging.example.com"));
            assert_eq!(layer.timeout_ms, Some(8000));
        }

        #[test]
        fn test_explicit_missing_file_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = load_file_layer(Some(&dir.path().join("nope.yaml")), dir.path()).unwrap_err();
            assert!(err.to_string().contains("not found"));
        }

        #[test]
        fn test_unknown_key_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bad.yaml");
            std::fs::write(&path, "headles: true\n").unwrap();
            let err = load_file_layer(Some(&path), dir.path()).unwrap_err();
            assert!(err.to_string().contains("bad.yaml"));
        }
    }
}

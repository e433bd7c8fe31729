//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sondeo::ConfigLayer;
use std::path::PathBuf;

/// Sondeo: run browser UI tests in isolated contexts with auto-retrying assertions
#[derive(Parser, Debug)]
#[command(name = "sondeo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tests
    Test(TestArgs),

    /// List tests without running them
    List(ListArgs),

    /// Show the resolved session configuration
    Config(ConfigArgs),
}

/// Options that feed the session configuration
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Config file (defaults to ./sondeo.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Browser engine
    #[arg(long, value_enum, default_value = "chromium", env = "SONDEO_ENGINE")]
    pub engine: EngineArg,

    /// Base URL for relative navigation
    #[arg(long, env = "SONDEO_BASE_URL")]
    pub base_url: Option<String>,

    /// Show the browser window (wins over --headless)
    #[arg(long)]
    pub headed: bool,

    /// Run without a browser window
    #[arg(long, env = "SONDEO_HEADLESS")]
    pub headless: bool,

    /// Delay before every action in milliseconds
    #[arg(long, value_name = "MS")]
    pub slow_mo: Option<u64>,

    /// Default assertion timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,
}

impl SessionArgs {
    /// Options set on the command line, as the highest-precedence layer
    #[must_use]
    pub fn overrides(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::new();
        if self.headed {
            layer.headless = Some(false);
        } else if self.headless {
            layer.headless = Some(true);
        }
        layer.slow_mo_ms = self.slow_mo;
        layer.timeout_ms = self.timeout;
        layer.base_url.clone_from(&self.base_url);
        layer.chromium_path.clone_from(&self.chromium_path);
        if self.no_sandbox {
            layer.sandbox = Some(false);
        }
        layer
    }
}

/// Arguments for the test command
#[derive(Parser, Debug)]
pub struct TestArgs {
    /// Test-name filters: substring, or `re:` followed by a regex
    pub filters: Vec<String>,

    /// Suite to run
    #[arg(long, default_value = "signin")]
    pub suite: String,

    /// Session options
    #[command(flatten)]
    pub session: SessionArgs,

    /// Number of tests run concurrently (0 = one per core)
    #[arg(short = 'j', long, default_value = "0")]
    pub workers: usize,

    /// Skip remaining tests after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Test-name filters: substring, or `re:` followed by a regex
    pub filters: Vec<String>,

    /// Suite to list
    #[arg(long, default_value = "signin")]
    pub suite: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Suite whose scope is included
    #[arg(long, default_value = "signin")]
    pub suite: String,

    /// Session options
    #[command(flatten)]
    pub session: SessionArgs,
}

/// Browser engine choice
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineArg {
    /// Chromium over the DevTools protocol
    #[default]
    Chromium,
    /// In-memory replica of the bundled suites' pages
    Mock,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Detect terminal support
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

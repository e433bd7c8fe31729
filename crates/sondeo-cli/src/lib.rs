//! Sondeo CLI Library
//!
//! Command-line interface for running Sondeo suites against Chromium or the
//! in-memory replica engine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod output;
mod runner;
pub mod scenarios;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, EngineArg, ListArgs, SessionArgs, TestArgs,
};
pub use config::{load_file_layer, CliConfig, ColorChoice, Verbosity, DEFAULT_CONFIG_FILE};
pub use error::{CliError, CliResult};
pub use output::{write_report, OutputFormat, ProgressReporter};
pub use runner::{engine_for, find_suite, list_tests, resolve_config, run_tests};

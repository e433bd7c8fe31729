//! Sondeo CLI: run browser UI suites
//!
//! ## Usage
//!
//! ```bash
//! sondeo test                          # Run the sign-in suite in Chromium
//! sondeo test toggle --engine mock     # Filtered run on the replica engine
//! sondeo test -f junit -o report.xml   # JUnit report
//! sondeo list 're:^landing'            # Show selected test names
//! sondeo config --headless             # Show the resolved configuration
//! ```
//!
//! Exit status: 0 when every test passed, 1 when a test failed, 2 on usage
//! or setup errors.

use clap::Parser;
use sondeo_cli::{
    list_tests, resolve_config, run_tests, Cli, CliConfig, CliResult, ColorChoice, Commands,
    Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_TEST_FAILURE: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    match run(&config, cli.command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "sondeo failed");
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    let mut config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_json(cli.log_json);
    if let Commands::Test(ref args) = cli.command {
        config = config.with_workers(args.workers).with_fail_fast(args.fail_fast);
    }
    config
}

fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.log_json {
        builder.json().init();
    } else {
        builder.with_ansi(config.color.should_color()).init();
    }
}

fn run(config: &CliConfig, command: Commands) -> CliResult<ExitCode> {
    match command {
        Commands::Test(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let report = runtime.block_on(run_tests(config, &args))?;
            if report.all_passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_TEST_FAILURE))
            }
        }
        Commands::List(args) => {
            for name in list_tests(&args)? {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(args) => {
            let resolved = resolve_config(&args)?;
            print!("{}", resolved.to_layer().to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

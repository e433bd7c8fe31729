//! Command execution: engine selection, config layering and reporting

use crate::commands::{ConfigArgs, EngineArg, ListArgs, SessionArgs, TestArgs};
use crate::config::{load_file_layer, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{write_report, OutputFormat, ProgressReporter};
use crate::scenarios;
use sondeo::{
    BrowserEngine, ConfigLayer, FailureMode, MockEngine, Selection, SessionConfig, SessionManager,
    SuiteReport, TestRunner, TestSuite,
};
use std::sync::Arc;

/// Build the engine a session runs on
///
/// # Errors
///
/// Returns error if the engine was not compiled in
pub fn engine_for(engine: EngineArg) -> CliResult<Arc<dyn BrowserEngine>> {
    match engine {
        EngineArg::Mock => Ok(Arc::new(MockEngine::new(scenarios::replica_site()))),
        #[cfg(feature = "browser")]
        EngineArg::Chromium => Ok(Arc::new(sondeo::ChromiumEngine::new())),
        #[cfg(not(feature = "browser"))]
        EngineArg::Chromium => Err(CliError::config(
            "chromium support not compiled in; rebuild with --features browser or use --engine mock",
        )),
    }
}

/// Look up a bundled suite
///
/// # Errors
///
/// Returns error if no suite has that name
pub fn find_suite(name: &str) -> CliResult<TestSuite> {
    scenarios::find(name).ok_or_else(|| {
        let known: Vec<String> = scenarios::bundled()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        CliError::invalid_argument(format!(
            "unknown suite '{name}' (available: {})",
            known.join(", ")
        ))
    })
}

fn base_layer(session: &SessionArgs) -> CliResult<ConfigLayer> {
    let dir = std::env::current_dir()?;
    load_file_layer(session.config.as_deref(), &dir)
}

/// Names of the tests a filter selects, in run order
///
/// # Errors
///
/// Returns error if the suite is unknown or a filter is malformed
pub fn list_tests(args: &ListArgs) -> CliResult<Vec<String>> {
    let suite = find_suite(&args.suite)?;
    let selection = Selection::parse(&args.filters)?;
    Ok(suite.plan(&selection).into_iter().map(|t| t.name).collect())
}

/// Session configuration after config file, suite scope and command line
///
/// # Errors
///
/// Returns error if a layer cannot be loaded or the result is invalid
pub fn resolve_config(args: &ConfigArgs) -> CliResult<SessionConfig> {
    let suite = find_suite(&args.suite)?;
    let base = base_layer(&args.session)?;
    let overrides = args.session.overrides();
    Ok(SessionConfig::layered([&base, suite.layer(), &overrides])?)
}

/// Run the selected tests and emit the report.
///
/// The rendered report goes to stdout and, with `--output`, to a file.
///
/// # Errors
///
/// Returns error for problems outside individual tests: bad arguments,
/// unreadable config, or an unwritable report. Test failures are part of
/// the returned report.
pub async fn run_tests(config: &CliConfig, args: &TestArgs) -> CliResult<SuiteReport> {
    let suite = find_suite(&args.suite)?;
    let selection = Selection::parse(&args.filters)?;
    let base = base_layer(&args.session)?;
    let engine = engine_for(args.session.engine)?;

    let failure_mode = if config.fail_fast {
        FailureMode::FailFast
    } else {
        FailureMode::CollectAll
    };
    let runner = TestRunner::new(SessionManager::new(engine))
        .with_base_layer(base)
        .with_overrides(args.session.overrides())
        .with_workers(config.effective_workers())
        .with_failure_mode(failure_mode);

    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let total = suite.plan(&selection).len();
    if total == 0 {
        reporter.warning("No tests matched the given filters");
    }
    reporter.start_progress(total as u64, suite.name());

    // Text reports list every result on stdout already
    let per_test_lines = args.format != OutputFormat::Text;
    let report = runner
        .run_with_progress(&suite, &selection, |result| {
            if per_test_lines {
                reporter.test_finished(result);
            } else {
                reporter.increment(1);
            }
        })
        .await;
    reporter.finish();

    if let Err(e) = runner.manager().shutdown().await {
        tracing::warn!(error = %e, "engine shutdown failed");
    }

    let rendered = args.format.render(&report)?;
    println!("{}", rendered.trim_end());
    if let Some(ref path) = args.output {
        write_report(path, &rendered)?;
        tracing::info!(path = %path.display(), "report written");
    }
    if per_test_lines {
        reporter.suite_summary(&report);
    }
    Ok(report)
}

//! Output formatting and progress reporting

use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sondeo::{SuiteReport, TestReport, TestStatus};
use std::path::Path;
use std::time::Duration;

/// Output format for suite reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
    /// JUnit XML
    Junit,
}

impl OutputFormat {
    /// Render a suite report in this format
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails
    pub fn render(self, report: &SuiteReport) -> CliResult<String> {
        match self {
            Self::Text => Ok(report.render_text()),
            Self::Json => report
                .to_json()
                .map_err(|e| CliError::report_generation(e.to_string())),
            Self::Junit => Ok(report.render_junit()),
        }
    }
}

/// Write a rendered report to `path`, creating parent directories
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn write_report(path: &Path, rendered: &str) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, rendered).map_err(|e| {
        CliError::report_generation(format!("cannot write {}: {e}", path.display()))
    })
}

/// Progress reporter for test execution (stderr)
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar for multiple tests
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Record one finished test
    pub fn test_finished(&self, report: &TestReport) {
        let millis = report.duration_ms;
        match report.status {
            TestStatus::Passed => self.success(&format!("{} ({millis}ms)", report.name)),
            TestStatus::Failed => {
                let reason = report
                    .failure
                    .as_ref()
                    .map_or("unknown error", |f| f.message.as_str());
                self.failure(&format!("{} ({millis}ms): {reason}", report.name));
            }
            TestStatus::Skipped => self.skipped(&report.name),
        }
        self.increment(1);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, line: &str) {
        match self.progress_bar {
            Some(ref pb) if !pb.is_hidden() => pb.println(line),
            _ => {
                let _ = self.term.write_line(line);
            }
        }
    }

    fn prefix(&self, symbol: &str, plain: &str, paint: fn(&str) -> String) -> String {
        if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("✓", "PASS", |s| style(s).green().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = self.prefix("✗", "FAIL", |s| style(s).red().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a skipped test
    pub fn skipped(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("-", "SKIP", |s| style(s).yellow().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("⚠", "WARN", |s| style(s).yellow().bold().to_string());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print the closing line for a suite run
    pub fn suite_summary(&self, report: &SuiteReport) {
        if self.quiet && report.all_passed() {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.summary_line(report));
    }

    fn summary_line(&self, report: &SuiteReport) -> String {
        let passed = report.passed_count();
        let failed = report.failed_count();
        let skipped = report.skipped_count();
        let secs = Duration::from_millis(report.duration_ms).as_secs_f64();
        let verdict = if failed > 0 { "FAILED" } else { "PASSED" };
        let head = format!(
            "{} on {}: {} tests in {secs:.2}s",
            report.suite_name,
            report.engine,
            report.total_count()
        );

        if !self.use_color {
            return format!(
                "{verdict} {head} ({passed} passed, {failed} failed, {skipped} skipped)"
            );
        }

        let passed_style = Style::new().green().bold();
        let failed_style = Style::new().red().bold();
        let verdict = if failed > 0 {
            failed_style.apply_to(verdict)
        } else {
            passed_style.apply_to(verdict)
        };
        let failed = if failed > 0 {
            failed_style.apply_to(failed).to_string()
        } else {
            failed.to_string()
        };
        format!(
            "{verdict} {head} ({} passed, {failed} failed, {} skipped)",
            passed_style.apply_to(passed),
            Style::new().yellow().apply_to(skipped)
        )
    }
}

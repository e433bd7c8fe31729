//! Test reporting: per-test results and suite summaries.
//!
//! Reports render as plain text, JSON (serde_json) or JUnit XML.

use crate::result::{SondeoError, SondeoResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// What the runner does after the first failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Run every selected test
    #[default]
    CollectAll,
    /// Skip tests not yet started once one fails
    FailFast,
}

/// Test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped
    Skipped,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Structured failure details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Error category (`assertion`, `interaction`, ...)
    pub kind: String,
    /// Full message
    pub message: String,
    /// Condition description, for assertion failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Attempted action, for interaction failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Locator or page description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Last observed state, for assertion failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<String>,
}

impl From<&SondeoError> for FailureDetail {
    fn from(error: &SondeoError) -> Self {
        let (condition, action, subject, last_observed) = match error {
            SondeoError::AssertionFailure {
                condition,
                subject,
                last_observed,
                ..
            } => (
                Some(condition.clone()),
                None,
                Some(subject.clone()),
                Some(last_observed.clone()),
            ),
            SondeoError::Interaction {
                action, locator, ..
            } => (None, Some(action.clone()), Some(locator.clone()), None),
            _ => (None, None, None, None),
        };
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            condition,
            action,
            subject,
            last_observed,
        }
    }
}

/// Result of one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Full test name (`group > test`)
    pub name: String,
    /// Status
    pub status: TestStatus,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Failure details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

impl TestReport {
    /// A passing result
    #[must_use]
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            duration_ms: duration.as_millis() as u64,
            failure: None,
        }
    }

    /// A failing result
    #[must_use]
    pub fn failed(name: impl Into<String>, duration: Duration, error: &SondeoError) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            duration_ms: duration.as_millis() as u64,
            failure: Some(FailureDetail::from(error)),
        }
    }

    /// A skipped result
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Skipped,
            duration_ms: 0,
            failure: None,
        }
    }

    /// Build from a test's outcome
    #[must_use]
    pub fn from_result(name: impl Into<String>, duration: Duration, result: &SondeoResult<()>) -> Self {
        match result {
            Ok(()) => Self::passed(name, duration),
            Err(e) => Self::failed(name, duration, e),
        }
    }

    /// Wall time
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Results of a suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite_name: String,
    /// Engine the suite ran on
    pub engine: String,
    /// Results in plan order
    pub results: Vec<TestReport>,
    /// Total wall time in milliseconds
    pub duration_ms: u64,
}

impl SuiteReport {
    /// Create an empty report
    #[must_use]
    pub fn new(suite_name: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            engine: engine.into(),
            results: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_passed()).count()
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    /// Count skipped tests
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == TestStatus::Skipped)
            .count()
    }

    /// Total number of results
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failed results
    #[must_use]
    pub fn failures(&self) -> Vec<&TestReport> {
        self.results.iter().filter(|r| r.status.is_failed()).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped ({:.2}s)",
            self.suite_name,
            self.passed_count(),
            self.failed_count(),
            self.skipped_count(),
            Duration::from_millis(self.duration_ms).as_secs_f64()
        )
    }

    /// Plain-text report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let mark = match result.status {
                TestStatus::Passed => "PASS",
                TestStatus::Failed => "FAIL",
                TestStatus::Skipped => "SKIP",
            };
            let _ = writeln!(out, "{mark} {} ({}ms)", result.name, result.duration_ms);
        }
        let failures = self.failures();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nFailures:");
            for result in failures {
                let _ = writeln!(out, "\n  {}", result.name);
                if let Some(ref failure) = result.failure {
                    let _ = writeln!(out, "    [{}] {}", failure.kind, failure.message);
                    if let Some(ref observed) = failure.last_observed {
                        let _ = writeln!(out, "    last observed: {observed}");
                    }
                }
            }
        }
        let _ = writeln!(out, "\n{}", self.summary());
        out
    }

    /// Pretty JSON report
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> SondeoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JUnit XML report
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
            escape_xml(&self.suite_name),
            self.total_count(),
            self.failed_count(),
            self.skipped_count(),
            Duration::from_millis(self.duration_ms).as_secs_f64()
        );
        for result in &self.results {
            let _ = writeln!(
                xml,
                r#"  <testcase name="{}" time="{:.3}">"#,
                escape_xml(&result.name),
                result.duration().as_secs_f64()
            );
            if let Some(ref failure) = result.failure {
                let _ = writeln!(
                    xml,
                    r#"    <failure type="{}" message="{}">{}</failure>"#,
                    failure.kind,
                    escape_xml(&failure.message),
                    escape_xml(failure.last_observed.as_deref().unwrap_or(&failure.message))
                );
            } else if result.status == TestStatus::Skipped {
                xml.push_str("    <skipped/>\n");
            }
            xml.push_str("  </testcase>\n");
        }
        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write the JUnit report to a file
    ///
    /// # Errors
    ///
    /// Returns error if file writing fails
    pub fn write_junit(&self, output_path: &Path) -> SondeoResult<()> {
        std::fs::write(output_path, self.render_junit())?;
        Ok(())
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion_error() -> SondeoError {
        SondeoError::AssertionFailure {
            condition: "to be visible".to_string(),
            subject: "locator(\"#id_password_toggle\")".to_string(),
            last_observed: "<button> hidden enabled".to_string(),
            timeout: Duration::from_millis(5000),
        }
    }

    fn report() -> SuiteReport {
        let mut report = SuiteReport::new("sign-in", "mock");
        report.results.push(TestReport::passed("landing > hero", Duration::from_millis(12)));
        report.results.push(TestReport::failed(
            "login > password toggle",
            Duration::from_millis(5010),
            &assertion_error(),
        ));
        report.results.push(TestReport::skipped("login > language"));
        report.duration_ms = 5100;
        report
    }

    mod test_status_tests {
        use super::*;

        #[test]
        fn test_status_is_passed() {
            assert!(TestStatus::Passed.is_passed());
            assert!(!TestStatus::Failed.is_passed());
            assert!(!TestStatus::Skipped.is_passed());
        }

        #[test]
        fn test_status_is_failed() {
            assert!(TestStatus::Failed.is_failed());
            assert!(!TestStatus::Skipped.is_failed());
        }
    }

    mod failure_detail_tests {
        use super::*;

        #[test]
        fn test_assertion_failure_keeps_diagnostics() {
            let detail = FailureDetail::from(&assertion_error());
            assert_eq!(detail.kind, "assertion");
            assert_eq!(detail.condition.as_deref(), Some("to be visible"));
            assert_eq!(detail.last_observed.as_deref(), Some("<button> hidden enabled"));
        }

        #[test]
        fn test_other_errors_only_carry_message() {
            let detail = FailureDetail::from(&SondeoError::navigation("https://x/", "dns"));
            assert_eq!(detail.kind, "navigation");
            assert!(detail.condition.is_none());
            assert!(detail.action.is_none());
            assert!(detail.message.contains("dns"));
        }

        #[test]
        fn test_interaction_failure_names_the_action() {
            let detail = FailureDetail::from(&SondeoError::Interaction {
                action: "fill \"bad@email.com\"".to_string(),
                locator: "get_by_label(\"Email\")".to_string(),
                reason: "element is not editable".to_string(),
            });
            assert_eq!(detail.kind, "interaction");
            assert_eq!(detail.action.as_deref(), Some("fill \"bad@email.com\""));
            assert_eq!(detail.subject.as_deref(), Some("get_by_label(\"Email\")"));
            assert!(detail.condition.is_none());

            let json = serde_json::to_value(&detail).unwrap();
            assert!(json.get("condition").is_none());
            assert_eq!(json["action"], "fill \"bad@email.com\"");
        }
    }

    mod suite_report_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let report = report();
            assert_eq!(report.passed_count(), 1);
            assert_eq!(report.failed_count(), 1);
            assert_eq!(report.skipped_count(), 1);
            assert!(!report.all_passed());
        }

        #[test]
        fn test_text_lists_failure_diagnostics() {
            let text = report().render_text();
            assert!(text.contains("PASS landing > hero"));
            assert!(text.contains("FAIL login > password toggle"));
            assert!(text.contains("last observed: <button> hidden enabled"));
            assert!(text.contains("1 passed, 1 failed, 1 skipped"));
        }

        #[test]
        fn test_json_shape() {
            let json = report().to_json().unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["results"][1]["status"], "failed");
            assert_eq!(value["results"][1]["failure"]["kind"], "assertion");
            assert!(value["results"][0].get("failure").is_none());
        }

        #[test]
        fn test_junit_escapes() {
            let xml = report().render_junit();
            assert!(xml.contains(r#"failures="1""#));
            assert!(xml.contains("login &gt; password toggle"));
            assert!(xml.contains("<skipped/>"));
        }

        #[test]
        fn test_write_junit() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("junit.xml");
            report().write_junit(&path).unwrap();
            assert!(std::fs::read_to_string(path).unwrap().contains("<testsuite"));
        }
    }
}

//! Suites, groups and the parallel test runner.
//!
//! A [`TestSuite`] holds [`TestGroup`]s (a `describe` block), each holding
//! [`TestCase`]s. Every level can carry a [`ConfigLayer`]; the runner
//! resolves a test's configuration as
//!
//! ```text
//! defaults < base (config file) < suite < group < test < overrides (CLI)
//! ```
//!
//! and runs each test inside [`SessionManager::run_scoped`], so every test
//! gets its own context and releases it on every exit path.

use crate::config::{ConfigLayer, SessionConfig};
use crate::context::{SessionManager, TestBody, TestContext};
use crate::reporter::{FailureMode, SuiteReport, TestReport};
use crate::result::{SondeoError, SondeoResult};
use futures::StreamExt;
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// A test body that can be run any number of times
pub type TestFn = Arc<dyn for<'a> Fn(&'a TestContext) -> TestBody<'a> + Send + Sync>;

/// One named test
#[derive(Clone)]
pub struct TestCase {
    name: String,
    layer: ConfigLayer,
    body: TestFn,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Create a test from a body returning a boxed future
    #[must_use]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a TestContext) -> TestBody<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            layer: ConfigLayer::default(),
            body: Arc::new(body),
        }
    }

    /// Per-test configuration
    #[must_use]
    pub fn with_config(mut self, layer: ConfigLayer) -> Self {
        self.layer = layer;
        self
    }

    /// Test name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A `describe` block
#[derive(Debug, Clone, Default)]
pub struct TestGroup {
    name: String,
    layer: ConfigLayer,
    tests: Vec<TestCase>,
}

impl TestGroup {
    /// Create an empty group
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Group-wide configuration
    #[must_use]
    pub fn with_config(mut self, layer: ConfigLayer) -> Self {
        self.layer = layer;
        self
    }

    /// Add a test
    #[must_use]
    pub fn test(mut self, case: TestCase) -> Self {
        self.tests.push(case);
        self
    }

    /// Group name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tests in declaration order
    #[must_use]
    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }
}

/// A named collection of groups
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    name: String,
    layer: ConfigLayer,
    groups: Vec<TestGroup>,
}

impl TestSuite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Suite-wide configuration
    #[must_use]
    pub fn with_config(mut self, layer: ConfigLayer) -> Self {
        self.layer = layer;
        self
    }

    /// Add a group
    #[must_use]
    pub fn group(mut self, group: TestGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Suite name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suite-wide configuration
    #[must_use]
    pub const fn layer(&self) -> &ConfigLayer {
        &self.layer
    }

    /// Number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.groups.iter().map(|g| g.tests.len()).sum()
    }

    /// Flatten into runnable tests, keeping only those accepted by `selection`
    #[must_use]
    pub fn plan(&self, selection: &Selection) -> Vec<PlannedTest> {
        self.groups
            .iter()
            .flat_map(|group| {
                let group_layer = self.layer.merged(&group.layer);
                group.tests.iter().map(move |case| PlannedTest {
                    name: full_name(&group.name, &case.name),
                    layer: group_layer.merged(&case.layer),
                    body: case.body.clone(),
                })
            })
            .filter(|planned| selection.accepts(&planned.name))
            .collect()
    }
}

fn full_name(group: &str, test: &str) -> String {
    if group.is_empty() {
        test.to_string()
    } else {
        format!("{group} > {test}")
    }
}

/// A test with its suite, group and test layers merged
#[derive(Clone)]
pub struct PlannedTest {
    /// Full name (`group > test`)
    pub name: String,
    /// Merged suite/group/test configuration
    pub layer: ConfigLayer,
    body: TestFn,
}

impl fmt::Debug for PlannedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedTest")
            .field("name", &self.name)
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

/// A test-name filter
#[derive(Debug, Clone)]
pub enum TestFilter {
    /// Case-sensitive substring
    Substring(String),
    /// Regular expression (`re:` prefix)
    Pattern(Regex),
}

impl TestFilter {
    /// Parse a filter; `re:` selects a regex
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] for an invalid regex
    pub fn parse(source: &str) -> SondeoResult<Self> {
        match source.strip_prefix("re:") {
            Some(pattern) => Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|e| SondeoError::config(format!("invalid filter {source:?}: {e}"))),
            None => Ok(Self::Substring(source.to_string())),
        }
    }

    /// Whether a test name passes the filter
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Substring(s) => name.contains(s.as_str()),
            Self::Pattern(re) => re.is_match(name),
        }
    }
}

/// Filters combined with OR; empty selects everything
#[derive(Debug, Clone, Default)]
pub struct Selection {
    filters: Vec<TestFilter>,
}

impl Selection {
    /// Select every test
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse filters
    ///
    /// # Errors
    ///
    /// Returns the first invalid filter's error
    pub fn parse<S: AsRef<str>>(sources: &[S]) -> SondeoResult<Self> {
        let filters = sources
            .iter()
            .map(|s| TestFilter::parse(s.as_ref()))
            .collect::<SondeoResult<Vec<_>>>()?;
        Ok(Self { filters })
    }

    /// Whether a test name is selected
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(name))
    }
}

/// Runs suites on a session manager
#[derive(Debug, Clone)]
pub struct TestRunner {
    manager: SessionManager,
    base: ConfigLayer,
    overrides: ConfigLayer,
    workers: usize,
    failure_mode: FailureMode,
}

impl TestRunner {
    /// Create a runner with one worker per available core
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            manager,
            base: ConfigLayer::default(),
            overrides: ConfigLayer::default(),
            workers,
            failure_mode: FailureMode::default(),
        }
    }

    /// Layer below the suite (config file)
    #[must_use]
    pub fn with_base_layer(mut self, layer: ConfigLayer) -> Self {
        self.base = layer;
        self
    }

    /// Layer above every test (command line)
    #[must_use]
    pub fn with_overrides(mut self, layer: ConfigLayer) -> Self {
        self.overrides = layer;
        self
    }

    /// Maximum concurrent tests
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Behavior after a failure
    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Session manager
    #[must_use]
    pub const fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Resolve the configuration one test runs with
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::Config`] if the result is invalid
    pub fn resolve_config(&self, test: &PlannedTest) -> SondeoResult<SessionConfig> {
        SessionConfig::layered([&self.base, &test.layer, &self.overrides])
    }

    /// Run the selected tests of a suite
    pub async fn run(&self, suite: &TestSuite, selection: &Selection) -> SuiteReport {
        self.run_with_progress(suite, selection, |_| {}).await
    }

    /// Run the selected tests, calling `on_result` as each one finishes.
    ///
    /// The returned report lists results in declaration order.
    pub async fn run_with_progress<P>(
        &self,
        suite: &TestSuite,
        selection: &Selection,
        mut on_result: P,
    ) -> SuiteReport
    where
        P: FnMut(&TestReport),
    {
        let planned = suite.plan(selection);
        let started = Instant::now();
        let stop = AtomicBool::new(false);
        tracing::info!(
            suite = suite.name(),
            tests = planned.len(),
            workers = self.workers,
            engine = self.manager.engine_name(),
            "running suite"
        );

        let mut results: Vec<(usize, TestReport)> = Vec::with_capacity(planned.len());
        let stop = &stop;
        let mut stream = futures::stream::iter(planned.iter().enumerate())
            .map(|(index, test)| async move { (index, self.run_one(test, stop).await) })
            .buffer_unordered(self.workers);
        while let Some((index, report)) = stream.next().await {
            on_result(&report);
            results.push((index, report));
        }
        drop(stream);
        results.sort_by_key(|(index, _)| *index);

        let mut report = SuiteReport::new(suite.name(), self.manager.engine_name());
        report.results = results.into_iter().map(|(_, r)| r).collect();
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            "suite finished"
        );
        report
    }

    async fn run_one(&self, test: &PlannedTest, stop: &AtomicBool) -> TestReport {
        if stop.load(Ordering::SeqCst) {
            return TestReport::skipped(&test.name);
        }
        let started = Instant::now();
        let span = tracing::info_span!("test", name = %test.name);
        let result = async {
            let config = self.resolve_config(test)?;
            let body = test.body.clone();
            self.manager.run_scoped(config, move |ctx| body(ctx)).await
        }
        .instrument(span)
        .await;

        match result {
            Ok(()) => {
                tracing::info!(test = %test.name, "passed");
            }
            Err(ref e) => {
                tracing::warn!(test = %test.name, kind = e.kind(), error = %e, "failed");
                if self.failure_mode == FailureMode::FailFast {
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }
        TestReport::from_result(&test.name, started.elapsed(), &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::expect;
    use crate::mock::{MockElement, MockEngine, MockPage, MockSite};
    use crate::reporter::TestStatus;
    use futures::FutureExt;

    fn site() -> MockSite {
        MockSite::new().with_page(
            "https://example.test/",
            MockPage::new().with_element(MockElement::heading("title", "Welcome")),
        )
    }

    fn passing(name: &str) -> TestCase {
        TestCase::new(name, |ctx| {
            async move {
                let _ = ctx.goto("/").await?;
                let _ = expect(&ctx.get_by_role("heading")).to_be_visible().await?;
                Ok(())
            }
            .boxed()
        })
    }

    fn failing(name: &str) -> TestCase {
        TestCase::new(name, |ctx| {
            async move {
                let _ = ctx.goto("/").await?;
                let _ = expect(&ctx.locator("#missing"))
                    .with_timeout(std::time::Duration::from_millis(20))
                    .to_be_visible()
                    .await?;
                Ok(())
            }
            .boxed()
        })
    }

    fn suite() -> TestSuite {
        TestSuite::new("demo")
            .with_config(ConfigLayer::new().with_base_url("https://example.test"))
            .group(TestGroup::new("landing").test(passing("title")).test(failing("missing")))
            .group(TestGroup::new("other").test(passing("again")))
    }

    fn runner(engine: &Arc<MockEngine>) -> TestRunner {
        TestRunner::new(SessionManager::new(engine.clone())).with_workers(2)
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn test_substring_filter() {
            let filter = TestFilter::parse("landing").unwrap();
            assert!(filter.matches("landing > title"));
            assert!(!filter.matches("other > again"));
        }

        #[test]
        fn test_regex_filter() {
            let filter = TestFilter::parse("re:^other").unwrap();
            assert!(filter.matches("other > again"));
            assert!(!filter.matches("landing > other"));
        }

        #[test]
        fn test_invalid_regex_is_config_error() {
            let err = TestFilter::parse("re:(").unwrap_err();
            assert_eq!(err.kind(), "config");
        }

        #[test]
        fn test_empty_selection_accepts_all() {
            assert!(Selection::all().accepts("anything"));
        }

        #[test]
        fn test_selection_is_union() {
            let selection = Selection::parse(&["title", "re:again$"]).unwrap();
            let names: Vec<_> = suite().plan(&selection).into_iter().map(|t| t.name).collect();
            assert_eq!(names, vec!["landing > title", "other > again"]);
        }
    }

    mod layering_tests {
        use super::*;

        #[test]
        fn test_precedence() {
            let suite = TestSuite::new("s")
                .with_config(ConfigLayer::new().with_slow_mo_ms(1000).with_timeout_ms(100))
                .group(
                    TestGroup::new("g")
                        .with_config(ConfigLayer::new().with_timeout_ms(200).with_poll_interval_ms(10))
                        .test(passing("t").with_config(ConfigLayer::new().with_poll_interval_ms(20))),
                );
            let engine = Arc::new(MockEngine::new(site()));
            let runner = runner(&engine)
                .with_base_layer(ConfigLayer::new().with_headless(false).with_slow_mo_ms(5))
                .with_overrides(ConfigLayer::new().with_headless(true));
            let planned = suite.plan(&Selection::all());
            let config = runner.resolve_config(&planned[0]).unwrap();

            assert!(config.headless);
            assert_eq!(config.slow_mo, std::time::Duration::from_millis(1000));
            assert_eq!(config.timeout, std::time::Duration::from_millis(200));
            assert_eq!(config.poll_interval, std::time::Duration::from_millis(20));
        }
    }

    mod runner_tests {
        use super::*;

        #[tokio::test]
        async fn test_run_reports_in_declaration_order() {
            let engine = Arc::new(MockEngine::new(site()));
            let report = runner(&engine).run(&suite(), &Selection::all()).await;

            let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["landing > title", "landing > missing", "other > again"]);
            assert_eq!(report.passed_count(), 2);
            assert_eq!(report.failed_count(), 1);
            assert_eq!(report.engine, "mock");
            let failure = report.results[1].failure.as_ref().unwrap();
            assert_eq!(failure.kind, "assertion");
        }

        #[tokio::test]
        async fn test_every_context_is_released() {
            let engine = Arc::new(MockEngine::new(site()));
            let runner = runner(&engine);
            let _ = runner.run(&suite(), &Selection::all()).await;

            assert_eq!(engine.open_contexts(), 0);
            assert_eq!(engine.opened_contexts(), 3);
            assert_eq!(runner.manager().stats().active(), 0);
        }

        #[tokio::test]
        async fn test_fail_fast_skips_remaining() {
            let engine = Arc::new(MockEngine::new(site()));
            let suite = TestSuite::new("ff")
                .with_config(ConfigLayer::new().with_base_url("https://example.test"))
                .group(TestGroup::new("g").test(failing("first")).test(passing("second")));
            let report = runner(&engine)
                .with_workers(1)
                .with_failure_mode(FailureMode::FailFast)
                .run(&suite, &Selection::all())
                .await;

            assert_eq!(report.results[0].status, TestStatus::Failed);
            assert_eq!(report.results[1].status, TestStatus::Skipped);
            assert_eq!(engine.opened_contexts(), 1);
        }

        #[tokio::test]
        async fn test_invalid_config_fails_only_that_test() {
            let engine = Arc::new(MockEngine::new(site()));
            let suite = suite().group(
                TestGroup::new("bad").test(passing("zero poll").with_config(ConfigLayer::new().with_poll_interval_ms(0))),
            );
            let report = runner(&engine).run(&suite, &Selection::parse(&["bad"]).unwrap()).await;

            assert_eq!(report.total_count(), 1);
            assert_eq!(report.results[0].failure.as_ref().unwrap().kind, "config");
        }

        #[tokio::test]
        async fn test_progress_callback_sees_every_result() {
            let engine = Arc::new(MockEngine::new(site()));
            let mut seen = 0;
            let _ = runner(&engine)
                .run_with_progress(&suite(), &Selection::all(), |_| seen += 1)
                .await;
            assert_eq!(seen, 3);
        }
    }
}

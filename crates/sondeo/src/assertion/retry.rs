//! Bounded polling.
//!
//! One loop serves both `expect` (assertion timeout) and the actionability
//! wait of `act` (action timeout). The first check happens immediately; the
//! last sleep is clamped to the remaining budget and every observation is
//! cut off at the budget, so a loop that never succeeds returns after at
//! least `timeout` and before `timeout + poll_interval`, however slow the
//! driver is.
//!
//! No timers are spawned: dropping the future stops polling.

use super::condition::Observation;
use crate::config::SessionConfig;
use crate::result::{SondeoError, SondeoResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Timeout and interval of one polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total budget
    pub timeout: Duration,
    /// Interval between observations
    pub poll_interval: Duration,
}

impl RetryConfig {
    /// Create a config with the default 50ms interval
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Budget for an assertion, honoring an explicit override
    #[must_use]
    pub fn for_assertion(config: &SessionConfig, timeout: Option<Duration>) -> Self {
        Self::new(timeout.unwrap_or(config.timeout)).with_poll_interval(config.poll_interval)
    }

    /// Budget for an actionability wait
    #[must_use]
    pub fn for_action(config: &SessionConfig) -> Self {
        Self::new(config.action_timeout).with_poll_interval(config.poll_interval)
    }
}

/// What a polling loop ended with
#[derive(Debug, Clone)]
pub struct Polled<T> {
    /// Last observed value
    pub last: T,
    /// Whether the last value was accepted
    pub accepted: bool,
    /// Time spent polling
    pub elapsed: Duration,
    /// Number of observations made
    pub attempts: u32,
}

/// Observe until `accept` holds or the budget runs out.
///
/// Errors from `observe` go through `recover`: an `Ok` value counts as a
/// failed observation and polling continues, an `Err` aborts the loop. Each
/// observation is cut off at the remaining budget plus half an interval; a
/// stalled observation ends the loop with the previous value, or with
/// `recover` applied to a driver error when there was none.
///
/// # Errors
///
/// Returns whatever `recover` rejects; a timeout is not an error here (see
/// [`Polled::accepted`]).
pub async fn poll_until<T, F, Fut, P, R>(
    config: RetryConfig,
    mut observe: F,
    accept: P,
    recover: R,
) -> SondeoResult<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SondeoResult<T>>,
    P: Fn(&T) -> bool,
    R: Fn(SondeoError) -> SondeoResult<T>,
{
    let start = Instant::now();
    let mut attempts = 0;
    let mut previous: Option<T> = None;

    loop {
        attempts += 1;
        let limit = config.timeout.saturating_sub(start.elapsed()) + config.poll_interval / 2;
        let last = match tokio::time::timeout(limit, observe()).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => recover(e)?,
            Err(_) => {
                tracing::debug!(limit_ms = limit.as_millis() as u64, "observation stalled");
                let last = match previous.take() {
                    Some(value) => value,
                    None => recover(SondeoError::driver(format!(
                        "no response within {}ms",
                        limit.as_millis()
                    )))?,
                };
                return Ok(Polled {
                    last,
                    accepted: false,
                    elapsed: start.elapsed(),
                    attempts,
                });
            }
        };
        let accepted = accept(&last);
        let elapsed = start.elapsed();

        if accepted || elapsed >= config.timeout {
            return Ok(Polled {
                last,
                accepted,
                elapsed,
                attempts,
            });
        }

        previous = Some(last);
        tokio::time::sleep(config.poll_interval.min(config.timeout - elapsed)).await;
    }
}

/// Recovery for page observations: driver errors (a navigation racing an
/// evaluate, a detached node) become [`Observation::Unavailable`]; lifecycle
/// and configuration errors abort.
///
/// # Errors
///
/// Returns every error that is not [`SondeoError::Driver`]
pub fn retry_driver_errors(error: SondeoError) -> SondeoResult<Observation> {
    match error {
        SondeoError::Driver { message } => {
            tracing::debug!(%message, "observation failed, retrying");
            Ok(Observation::Unavailable(message))
        }
        other => Err(other),
    }
}

/// Terminal result of evaluating a condition within a timeout budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionOutcome {
    /// The condition held
    Satisfied {
        /// Time until it held
        elapsed: Duration,
        /// Observations made
        attempts: u32,
    },
    /// The budget elapsed first
    TimedOut {
        /// Time spent
        elapsed: Duration,
        /// Observations made
        attempts: u32,
        /// Last observation, for diagnostics
        last_observed: Observation,
    },
}

impl AssertionOutcome {
    /// Whether the condition held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Satisfied { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Observations made
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Satisfied { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }
}

impl From<Polled<Observation>> for AssertionOutcome {
    fn from(polled: Polled<Observation>) -> Self {
        if polled.accepted {
            Self::Satisfied {
                elapsed: polled.elapsed,
                attempts: polled.attempts,
            }
        } else {
            Self::TimedOut {
                elapsed: polled.elapsed,
                attempts: polled.attempts,
                last_observed: polled.last,
            }
        }
    }
}

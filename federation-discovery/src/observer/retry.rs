//! Retry policies deciding whether and when a failed discovery is repeated.

use std::{fmt::Debug, time::Duration};

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};

use crate::error::DiscoveryError;

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;
const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(60);

/// A strategy for retrying failed discovery attempts.
///
/// The observer creates one [`RetryState`] per streak of consecutive failures and drops it once an attempt succeeds.
pub trait RetryPolicy: Send + Sync + Debug {
    /// Creates the state for a new streak of failures.
    fn create_retry_state(&self) -> Box<dyn RetryState>;
}

/// The per-streak state of a [`RetryPolicy`].
pub trait RetryState: Send + Debug {
    /// Returns the delay before the next attempt, or `None` if the observer must give up.
    fn next_delay(&mut self, err: &DiscoveryError) -> Option<Duration>;
}

/// Exponential backoff with jitter, optionally bounded by elapsed time and by the number of retries.
#[derive(Debug, Clone)]
pub struct ExponentialRetryPolicy {
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
    max_elapsed_time: Option<Duration>,
    max_retries: Option<usize>,
}

impl Default for ExponentialRetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_elapsed_time: Some(DEFAULT_MAX_ELAPSED_TIME),
            max_retries: None,
        }
    }
}

impl ExponentialRetryPolicy {
    /// Sets the delay before the first retry.
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the upper bound of a single delay.
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets the factor the delay grows by after each retry.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the relative jitter applied to each delay. `0.0` disables jitter.
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    /// Sets the time after which a streak of failures is given up. `None` retries forever.
    pub fn with_max_elapsed_time(mut self, max_elapsed_time: Option<Duration>) -> Self {
        self.max_elapsed_time = max_elapsed_time;
        self
    }

    /// Sets the number of retries after which a streak of failures is given up.
    pub fn with_max_retries(mut self, max_retries: Option<usize>) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl RetryPolicy for ExponentialRetryPolicy {
    fn create_retry_state(&self) -> Box<dyn RetryState> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(self.max_elapsed_time)
            .build();
        Box::new(ExponentialRetryState {
            backoff,
            retries: 0,
            max_retries: self.max_retries,
        })
    }
}

#[derive(Debug)]
struct ExponentialRetryState {
    backoff: ExponentialBackoff,
    retries: usize,
    max_retries: Option<usize>,
}

impl RetryState for ExponentialRetryState {
    fn next_delay(&mut self, err: &DiscoveryError) -> Option<Duration> {
        if !err.kind().is_retryable() {
            return None;
        }
        if self.max_retries.is_some_and(|max| self.retries >= max) {
            return None;
        }
        let delay = self.backoff.next_backoff()?;
        self.retries += 1;
        Some(delay)
    }
}

/// Retries after each of the given delays in turn, then gives up.
#[derive(Debug, Clone, Default)]
pub struct FixedDelayRetryPolicy {
    delays: Vec<Duration>,
}

impl FixedDelayRetryPolicy {
    /// Creates a policy allowing `delays.len()` retries.
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }
}

impl RetryPolicy for FixedDelayRetryPolicy {
    fn create_retry_state(&self) -> Box<dyn RetryState> {
        Box::new(FixedDelayRetryState {
            delays: self.delays.clone().into_iter(),
        })
    }
}

#[derive(Debug)]
struct FixedDelayRetryState {
    delays: std::vec::IntoIter<Duration>,
}

impl RetryState for FixedDelayRetryState {
    fn next_delay(&mut self, err: &DiscoveryError) -> Option<Duration> {
        if !err.kind().is_retryable() {
            return None;
        }
        self.delays.next()
    }
}

/// Never retries: the first failure is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn create_retry_state(&self) -> Box<dyn RetryState> {
        Box::new(NoRetryPolicy)
    }
}

impl RetryState for NoRetryPolicy {
    fn next_delay(&mut self, _err: &DiscoveryError) -> Option<Duration> {
        None
    }
}

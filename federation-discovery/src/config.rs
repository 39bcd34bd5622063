//! Configuration of the observer and of the transport it runs on.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    observer::retry::{ExponentialRetryPolicy, RetryPolicy},
    transport::LocalDatabase,
};

/// A configuration for a [`FederationObserver`](crate::FederationObserver).
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// See [`with_retry_policy`](crate::FederationObserverBuilder::with_retry_policy).
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            retry_policy: Arc::new(ExponentialRetryPolicy::default()),
        }
    }
}

/// Observer settings as they appear in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverSettings {
    /// Path of the database this process is configured to use.
    pub database: String,
    /// Endpoint used for discovery, for example `https://disc.example.com:2135`.
    pub discovery_endpoint: String,
    /// Client-side timeout of a single discovery call, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Settings of the exponential retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Upper bound of a single delay, in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Growth factor of the delay.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Relative jitter in `[0, 1)`.
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
    /// Time after which a failure streak is given up, in milliseconds. `None` retries forever.
    #[serde(default = "default_max_elapsed_time_ms")]
    pub max_elapsed_time_ms: Option<u64>,
    /// Number of retries after which a failure streak is given up.
    #[serde(default)]
    pub max_retries: Option<usize>,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_randomization_factor() -> f64 {
    0.5
}

fn default_max_elapsed_time_ms() -> Option<u64> {
    Some(60_000)
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_elapsed_time_ms: default_max_elapsed_time_ms(),
            max_retries: None,
        }
    }
}

impl RetrySettings {
    /// Builds the retry policy described by these settings.
    pub fn to_policy(&self) -> Result<ExponentialRetryPolicy, ConfigError> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::InvalidRandomizationFactor(
                self.randomization_factor,
            ));
        }
        Ok(ExponentialRetryPolicy::default()
            .with_initial_interval(Duration::from_millis(self.initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.max_interval_ms))
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(self.max_elapsed_time_ms.map(Duration::from_millis))
            .with_max_retries(self.max_retries))
    }
}

impl ObserverSettings {
    /// The locally configured database, used in single database mode.
    pub fn local_database(&self) -> Result<LocalDatabase, ConfigError> {
        if self.database.is_empty() {
            return Err(ConfigError::EmptyDatabase);
        }
        Ok(LocalDatabase::new(
            self.database.clone(),
            self.discovery_endpoint.clone(),
        ))
    }

    /// Client-side timeout of a single discovery call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds the observer configuration described by these settings.
    pub fn observer_config(&self) -> Result<ObserverConfig, ConfigError> {
        Ok(ObserverConfig {
            retry_policy: Arc::new(self.retry.to_policy()?),
        })
    }
}

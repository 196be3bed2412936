//! Backoff for transient transport failures
//!
//! Only errors that report `is_retryable()` are attempted again. Rate
//! limits and provider rejections go straight back to the caller.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use log::warn;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first; 0 disables retrying
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    /// Give up once this much time has passed, whatever `max_retries` says
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: Some(Duration::from_secs(20)),
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: self.max_elapsed_time,
            ..ExponentialBackoff::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails permanently or the retry
    /// budget is spent. Errors returned after a retry carry an `attempts`
    /// annotation.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = self.config.schedule();
        let mut retries = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let wait = if err.is_retryable() && retries < self.config.max_retries {
                schedule.next_backoff()
            } else {
                None
            };

            match wait {
                Some(wait) => {
                    retries += 1;
                    warn!(
                        "Oracle call failed ({}), retry {}/{} in {:?}",
                        err, retries, self.config.max_retries, wait
                    );
                    tokio::time::sleep(wait).await;
                }
                None if retries == 0 => return Err(err),
                None => return Err(err.annotate("attempts", retries)),
            }
        }
    }
}

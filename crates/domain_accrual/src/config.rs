//! Accrual runtime configuration

use serde::Deserialize;
use std::time::Duration;

/// Task queue accrual processes are hosted on
pub const DEFAULT_TASK_QUEUE: &str = "CREATE_BILL_QUEUE";

/// Retry policy applied to every activity invocation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub initial_interval_ms: u64,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_coefficient: f64,
    /// Upper bound on the delay, in milliseconds
    pub maximum_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn maximum_interval(&self) -> Duration {
        Duration::from_millis(self.maximum_interval_ms)
    }

    /// Delay to wait after a failure that was preceded by `delay`
    pub fn next_interval(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.backoff_coefficient) as u64);
        next.min(self.maximum_interval())
    }
}

/// Options applied to each activity invocation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActivityOptions {
    /// Upper bound on a single attempt, in milliseconds
    pub start_to_close_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout_ms: 60_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ActivityOptions {
    pub fn start_to_close_timeout(&self) -> Duration {
        Duration::from_millis(self.start_to_close_timeout_ms)
    }
}

/// Accrual runtime configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Task queue name, used to label process logs
    pub task_queue: String,
    /// Capacity of each per-bill channel
    pub channel_capacity: usize,
    pub activity: ActivityOptions,
    /// Seconds between drift audits
    pub audit_interval_secs: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            channel_capacity: 1024,
            activity: ActivityOptions::default(),
            audit_interval_secs: 300,
        }
    }
}

impl AccrualConfig {
    pub fn audit_interval(&self) -> Duration {
        Duration::from_secs(self.audit_interval_secs)
    }
}

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::config::ActivityOptions;
use crate::error::AccrualError;

// ============================================================================
// Activity Executor
// ============================================================================
//
// Runs an activity under a start-to-close timeout and retries transient
// failures with exponential backoff. A timed-out attempt counts as transient.
// Non-transient failures (closed bill, missing rows) return immediately.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ActivityExecutor {
    options: ActivityOptions,
}

impl ActivityExecutor {
    pub fn new(options: ActivityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    /// Execute an activity, retrying transient failures
    ///
    /// `operation` receives the 1-based attempt number and is invoked once per
    /// attempt.
    pub async fn execute<F, Fut, T>(&self, activity: &'static str, mut operation: F) -> Result<T, AccrualError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AccrualError>>,
    {
        let policy = &self.options.retry;
        let limit = self.options.start_to_close_timeout();
        let mut attempt = 0;
        let mut delay = policy.initial_interval();

        loop {
            attempt += 1;

            let error = match timeout(limit, operation(attempt)).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        tracing::info!(activity, attempt, "Activity succeeded after retry");
                    }
                    return Ok(result);
                }
                Ok(Err(error)) => error,
                Err(_) => AccrualError::Timeout {
                    activity,
                    timeout_ms: duration_ms(limit),
                },
            };

            if !error.is_transient() {
                tracing::debug!(activity, error = %error, "Permanent failure, not retrying");
                return Err(error);
            }

            if attempt >= policy.max_attempts {
                tracing::warn!(
                    activity,
                    attempt,
                    error = %error,
                    "Activity failed after all retries"
                );
                return Err(error);
            }

            tracing::warn!(
                activity,
                attempt,
                error = %error,
                delay_ms = duration_ms(delay),
                "Transient failure, retrying after delay"
            );

            sleep(delay).await;
            delay = policy.next_interval(delay);
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

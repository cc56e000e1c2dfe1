//! Bounded exponential-backoff retry for data-layer calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Whether an error may succeed if the operation is repeated.
pub trait RetryClassify {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. The last error is returned.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: RetryClassify + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => {
                debug!(attempt, error = %err, "Non-retryable failure");
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %err, "Operation failed after retries");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("transient")]
        Transient,
        #[error("unique violation")]
        Unique,
    }

    impl RetryClassify for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_runs_once() {
        let mut calls = 0;
        let result: Result<(), TestError> = with_retry(RetryPolicy::default(), || {
            calls += 1;
            async { Err(TestError::Unique) }
        })
        .await;
        assert!(matches!(result, Err(TestError::Unique)));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_exhausts_attempts_with_growing_delays() {
        let started = Instant::now();
        let stamps = Mutex::new(Vec::new());
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result: Result<(), TestError> = with_retry(policy, || {
            stamps.lock().expect("stamps").push(started.elapsed());
            async { Err(TestError::Transient) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Transient)));
        let stamps = stamps.into_inner().expect("stamps");
        assert_eq!(stamps.len(), 3);
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(100));
        assert!(stamps[2] - stamps[1] >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<u8, TestError> = with_retry(RetryPolicy::default(), || {
            calls += 1;
            let outcome = if calls < 3 { Err(TestError::Transient) } else { Ok(9) };
            async move { outcome }
        })
        .await;
        assert_eq!(result.ok(), Some(9));
        assert_eq!(calls, 3);
    }
}

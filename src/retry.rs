//! Bounded retry with exponential backoff.
//!
//! One policy for the whole pipeline, parameterized by an error-class
//! predicate, instead of per-component retry loops.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential-backoff policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,

    /// Delay after the first failure
    pub base_delay: Duration,

    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt count.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the backoff cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Backoff before attempt `n` (1-based; attempt 1 has no delay).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Run `op` up to `policy.max_attempts` times, retrying only errors
/// `is_transient` accepts. Returns the last error when exhausted.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_transient(&e) => {
                tracing::debug!(attempt, "retrying after transient error");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));

        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        // Capped
        assert_eq!(policy.delay_before(4), Duration::from_millis(350));
        assert_eq!(policy.delay_before(5), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4).with_base_delay(Duration::from_millis(1));

        let result: Result<u32, &str> = retry(&policy, |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4).with_base_delay(Duration::from_millis(1));

        let result: Result<(), &str> = retry(&policy, |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_ceiling() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));

        let result: Result<(), &str> = retry(&policy, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

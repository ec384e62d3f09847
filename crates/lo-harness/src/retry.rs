use std::time::Duration;

use tracing::{debug, warn};

/// Bounded retry with deterministic exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (2 = up to 3 attempts total).
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub base_backoff: Duration,
    /// Cap on the backoff as it doubles.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            max_backoff,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Run `f` until it succeeds, the error is not transient, or the retry
/// budget is spent. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_transient: P,
    mut f: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    for attempt in 0..=policy.max_retries {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt = attempt + 1, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_transient(&err) || attempt == policy.max_retries {
                    return Err(err);
                }
                let backoff = policy.backoff_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    error = %err,
                    ?backoff,
                    "transient failure, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
    unreachable!("loop returns on final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry(
            &quick_policy(2),
            "test-op",
            |_| true,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &quick_policy(2),
            "test-op",
            |_| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("still broken".to_string()) }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "still broken");
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 try + 2 retries
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &quick_policy(5),
            "test-op",
            |_| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
    }
}

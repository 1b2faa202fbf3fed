//! Retry policy for generator calls.
//!
//! Rate limiting is the only failure worth waiting out; everything else is
//! returned on the first attempt.

use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default total number of attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Fixed-backoff retry policy for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Result of running an operation under a retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The final result.
    pub result: Result<T, LlmError>,
    /// How many attempts were made.
    pub attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Generator rate limited, backing off"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                result => {
                    return RetryOutcome {
                        result,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> LlmError {
        LlmError::RateLimited {
            retry_after_secs: None,
        }
    }

    #[test]
    fn default_policy_matches_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn success_needs_one_attempt() {
        let outcome = RetryPolicy::no_retry().run(|| async { Ok::<_, LlmError>(7) }).await;
        assert_eq!(outcome.result, Ok(7));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried_until_budget_spent() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let outcome = policy
            .run(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(rate_limited())
                }
            })
            .await;

        assert_eq!(outcome.result, Err(rate_limited()));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps between three attempts.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = RetryPolicy::default()
            .run(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(rate_limited())
                    } else {
                        Ok("answer")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result, Ok("answer"));
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = RetryPolicy::default()
            .run(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(LlmError::Unauthorized {
                        provider: "openai".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(outcome.result, Err(LlmError::Unauthorized { .. })));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let outcome = RetryPolicy::new(0, Duration::ZERO)
            .run(|| async { Err::<(), _>(rate_limited()) })
            .await;
        assert_eq!(outcome.attempts, 1);
    }
}

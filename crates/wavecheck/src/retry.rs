//! Rate-limit retry policy.
//!
//! The policy is the single authority for backoff in this crate: it decides
//! whether a failed remote call is retried and how long to wait, and the wait
//! is always the duration the server specified. Callers never sleep or retry
//! on their own; the [`GitHubClient`](crate::github::GitHubClient) routes
//! every remote call through [`RetryPolicy::run`].

use std::future::Future;
use std::time::Duration;

use crate::github::GitHubError;
use crate::progress::{HarvestProgress, ProgressCallback, emit};

/// The outcome of consulting the policy for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether to suspend and retry.
    pub retry: bool,
    /// How long to wait before the retry (zero when not retrying).
    pub delay: Duration,
}

impl RetryDecision {
    #[must_use]
    pub fn retry_after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }

    #[must_use]
    pub fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Decides whether to suspend-then-retry or propagate, per failed call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Initial value of the remaining-retry counter handed to [`decide`].
    ///
    /// The policy orders a backoff only once the counter reaches zero, so
    /// the default of zero means the first rate-limit failure waits out the
    /// server-specified duration and retries once.
    ///
    /// [`decide`]: RetryPolicy::decide
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 0 }
    }
}

impl RetryPolicy {
    /// Classify a failure and decide whether to back off.
    ///
    /// Primary and secondary rate-limit errors at the final retry attempt
    /// (`retries_remaining == 0`) are retried after the server-specified
    /// wait; every other failure propagates immediately.
    #[must_use]
    pub fn decide(&self, err: &GitHubError, retries_remaining: u32) -> RetryDecision {
        match err {
            GitHubError::PrimaryRateLimit { retry_after } if retries_remaining == 0 => {
                tracing::error!(
                    wait_secs = retry_after.as_secs(),
                    retries_remaining,
                    "primary rate limit exceeded, waiting"
                );
                RetryDecision::retry_after(*retry_after)
            }
            GitHubError::SecondaryRateLimit { retry_after } if retries_remaining == 0 => {
                tracing::error!(
                    wait_secs = retry_after.as_secs(),
                    retries_remaining,
                    "secondary rate limit exceeded, waiting"
                );
                RetryDecision::retry_after(*retry_after)
            }
            other => {
                tracing::error!(error = %other, retries_remaining, "not retrying");
                RetryDecision::give_up()
            }
        }
    }

    /// Drive an async operation under the policy.
    ///
    /// The policy permits exactly one server-directed retry once the
    /// remaining-retry counter reaches zero; a further failure after that
    /// retry propagates. `context` names the call for logs and progress
    /// events (a REST route or query name).
    pub async fn run<T, F, Fut>(
        &self,
        context: &str,
        on_progress: Option<&ProgressCallback>,
        mut op: F,
    ) -> Result<T, GitHubError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GitHubError>>,
    {
        let mut remaining = self.max_retries;
        let mut exhausted = false;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if exhausted {
                        return Err(err);
                    }
                    let decision = self.decide(&err, remaining);
                    if !decision.retry {
                        return Err(err);
                    }

                    emit(
                        on_progress,
                        HarvestProgress::RateLimitWait {
                            context: context.to_string(),
                            seconds: decision.delay.as_secs(),
                        },
                    );
                    tokio::time::sleep(decision.delay).await;

                    exhausted = remaining == 0;
                    remaining = remaining.saturating_sub(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn primary(secs: u64) -> GitHubError {
        GitHubError::PrimaryRateLimit {
            retry_after: Duration::from_secs(secs),
        }
    }

    fn secondary(secs: u64) -> GitHubError {
        GitHubError::SecondaryRateLimit {
            retry_after: Duration::from_secs(secs),
        }
    }

    #[test]
    fn primary_limit_at_final_attempt_retries_with_server_delay() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(&primary(42), 0);
        assert!(decision.retry);
        assert_eq!(decision.delay, Duration::from_secs(42));
    }

    #[test]
    fn secondary_limit_at_final_attempt_retries_with_server_delay() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(&secondary(7), 0);
        assert!(decision.retry);
        assert_eq!(decision.delay, Duration::from_secs(7));
    }

    #[test]
    fn rate_limit_with_budget_remaining_does_not_retry() {
        let policy = RetryPolicy { max_retries: 3 };
        assert_eq!(policy.decide(&primary(42), 3), RetryDecision::give_up());
    }

    #[test]
    fn other_errors_never_retry() {
        let policy = RetryPolicy::default();
        let err = GitHubError::Status {
            status: 404,
            route: "/repos/acme/api".to_string(),
        };
        assert_eq!(policy.decide(&err, 0), RetryDecision::give_up());
    }

    #[tokio::test(start_paused = true)]
    async fn run_waits_server_delay_then_retries_once() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let events: Arc<Mutex<Vec<HarvestProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        let calls_capture = Arc::clone(&calls);
        let op = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                if calls_capture.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(primary(300))
                } else {
                    Ok(17u32)
                }
            }
        };

        let started = tokio::time::Instant::now();
        let result = policy.run("graphql", Some(&callback), op).await;

        assert_eq!(result.unwrap(), 17);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The sleep was the server-specified 300s, not an invented schedule.
        assert_eq!(started.elapsed(), Duration::from_secs(300));

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert!(events.iter().any(|e| matches!(
            e,
            HarvestProgress::RateLimitWait { seconds: 300, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn run_propagates_after_the_single_permitted_retry() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_capture = Arc::clone(&calls);
        let op = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(secondary(5))
            }
        };

        let err = policy
            .run("/repos/acme/api/branches", None, op)
            .await
            .expect_err("second rate limit failure should propagate");
        assert!(err.is_rate_limit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_does_not_retry_other_errors() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_capture = Arc::clone(&calls);
        let op = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(GitHubError::Status {
                    status: 500,
                    route: "graphql".to_string(),
                })
            }
        };

        let err = policy.run("graphql", None, op).await.expect_err("expected error");
        assert!(matches!(err, GitHubError::Status { status: 500, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

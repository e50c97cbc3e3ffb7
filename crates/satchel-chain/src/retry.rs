//! Bounded exponential-backoff retry policy.
//!
//! Transient failures are transport errors, HTTP 5xx and HTTP 429. They are
//! retried after `base * 2^(n-1)` (capped at `max_delay`) for the n-th
//! retry, up to `max_retries` retries. Any other response is handed back to
//! the caller untouched on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ChainError;
use crate::transport::HttpResponse;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Status codes that indicate a transient condition.
    pub fn is_transient_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Run `call` under this policy with the default transient-status rule.
    pub async fn run<F, Fut>(&self, op: &str, call: F) -> Result<HttpResponse, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, ChainError>>,
    {
        self.run_with(op, call, |resp| Self::is_transient_status(resp.status))
            .await
    }

    /// Run `call`, retrying transport errors and any response for which
    /// `is_transient` returns true.
    ///
    /// Non-transient responses (including non-2xx ones) are returned as
    /// `Ok` for the caller to interpret. Errors other than
    /// [`ChainError::Transport`] are returned immediately.
    pub async fn run_with<F, Fut, P>(
        &self,
        op: &str,
        mut call: F,
        is_transient: P,
    ) -> Result<HttpResponse, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, ChainError>>,
        P: Fn(&HttpResponse) -> bool,
    {
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.delay_for(attempt - 1);
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying indexer request"
                );
                tokio::time::sleep(delay).await;
            }

            match call().await {
                Ok(resp) if is_transient(&resp) => {
                    debug!(op, attempt, status = resp.status, "transient response");
                    last_error = format!("HTTP {}", resp.status);
                }
                Ok(resp) => return Ok(resp),
                Err(ChainError::Transport(e)) => {
                    debug!(op, attempt, error = %e, "transport failure");
                    last_error = e;
                }
                Err(other) => return Err(other),
            }
        }

        Err(ChainError::MaxRetriesExceeded {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn scripted(
        responses: Vec<Result<HttpResponse, ChainError>>,
    ) -> (
        Arc<Mutex<VecDeque<Result<HttpResponse, ChainError>>>>,
        Arc<Mutex<u32>>,
    ) {
        (
            Arc::new(Mutex::new(responses.into())),
            Arc::new(Mutex::new(0)),
        )
    }

    #[test]
    fn delay_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(4), Duration::from_secs(8));
        assert_eq!(p.delay_for(5), Duration::from_secs(10));
        assert_eq!(p.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn transient_statuses() {
        assert!(RetryPolicy::is_transient_status(429));
        assert!(RetryPolicy::is_transient_status(500));
        assert!(RetryPolicy::is_transient_status(503));
        assert!(!RetryPolicy::is_transient_status(400));
        assert!(!RetryPolicy::is_transient_status(404));
        assert!(!RetryPolicy::is_transient_status(200));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_three_rate_limits() {
        let (queue, calls) = scripted(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(200, "ok")),
        ]);
        let start = tokio::time::Instant::now();
        let resp = RetryPolicy::default()
            .run("test", || {
                let next = queue.lock().pop_front();
                *calls.lock() += 1;
                async move { next.unwrap_or_else(|| Ok(HttpResponse::new(200, ""))) }
            })
            .await
            .unwrap();
        assert_eq!(resp.body, "ok");
        assert_eq!(*calls.lock(), 4);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_four_rate_limits() {
        let (queue, calls) = scripted(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(200, "never reached")),
        ]);
        let err = RetryPolicy::default()
            .run("test", || {
                let next = queue.lock().pop_front();
                *calls.lock() += 1;
                async move { next.unwrap_or_else(|| Ok(HttpResponse::new(200, ""))) }
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::MaxRetriesExceeded {
                attempts: 4,
                last_error: "HTTP 429".into()
            }
        );
        assert_eq!(*calls.lock(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_not_retried() {
        let (queue, calls) = scripted(vec![Ok(HttpResponse::new(400, "bad"))]);
        let resp = RetryPolicy::default()
            .run("test", || {
                let next = queue.lock().pop_front();
                *calls.lock() += 1;
                async move { next.unwrap_or_else(|| Ok(HttpResponse::new(200, ""))) }
            })
            .await
            .unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_retried() {
        let (queue, calls) = scripted(vec![
            Err(ChainError::Transport("connection reset".into())),
            Err(ChainError::Transport("timed out".into())),
            Ok(HttpResponse::new(200, "ok")),
        ]);
        let start = tokio::time::Instant::now();
        let resp = RetryPolicy::default()
            .run("test", || {
                let next = queue.lock().pop_front();
                *calls.lock() += 1;
                async move { next.unwrap_or_else(|| Ok(HttpResponse::new(200, ""))) }
            })
            .await
            .unwrap();
        assert_eq!(resp.body, "ok");
        assert_eq!(*calls.lock(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_exhaust_with_last_error() {
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let err = policy
            .run("test", || async { Ok(HttpResponse::new(503, "down")) })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::MaxRetriesExceeded {
                attempts: 2,
                last_error: "HTTP 503".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry_policy_makes_one_attempt() {
        let err = RetryPolicy::none()
            .run("test", || async { Err(ChainError::Transport("refused".into())) })
            .await
            .unwrap_err();
        assert!(err.is_retry_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_predicate_overrides_status_rule() {
        let resp = RetryPolicy::default()
            .run_with(
                "test",
                || async { Ok(HttpResponse::new(500, "txn-already-known")) },
                |r| !r.body.contains("already"),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 500);
    }
}

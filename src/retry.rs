//! Shared retry-with-backoff policy.
//!
//! The extractor and both enrichers retry transient failures with the same
//! shape: bounded attempts, exponential backoff, jitter, and a per-call
//! retryable-error predicate. This lives here once and is parameterized at
//! each call site.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Bounded retry policy with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never zero.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given attempt bound and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// Policy for page navigations: `nav_retries` retries on top of the
    /// first attempt, short base delay.
    pub fn navigation(config: &crate::config::Config) -> Self {
        Self::new(config.nav_retries + 1, Duration::from_millis(500))
    }

    /// Policy for enrichment HTTP calls: `enrich_retries` retries on top of
    /// the first attempt.
    pub fn enrichment(config: &crate::config::Config) -> Self {
        Self::new(
            config.enrich_retries + 1,
            Duration::from_millis(config.enrich_retry_delay_ms),
        )
    }

    /// Delay before retry number `retry` (0-based: first retry is 0).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << retry.min(16));
        let capped = exp.min(self.max_delay);
        if self.jitter && !capped.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 4);
            capped + Duration::from_millis(extra)
        } else {
            capped
        }
    }

    /// Run `op` until it succeeds, a non-retryable error occurs, or attempts
    /// are exhausted. Returns the last error on exhaustion.
    pub async fn run<T, E, Fut, Op, Pred>(
        &self,
        op_name: &str,
        retryable: Pred,
        op: Op,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Pred: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        self.run_hinted(op_name, retryable, |_| None, op).await
    }

    /// Like [`run`](Self::run), but a server-prescribed delay (such as a
    /// Retry-After header) overrides the backoff schedule for that retry.
    /// Hinted delays are still capped at `max_delay`.
    pub async fn run_hinted<T, E, Fut, Op, Pred, Hint>(
        &self,
        op_name: &str,
        retryable: Pred,
        delay_hint: Hint,
        mut op: Op,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Pred: Fn(&E) -> bool,
        Hint: Fn(&E) -> Option<Duration>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !retryable(&e) {
                        return Err(e);
                    }
                    let delay = delay_hint(&e)
                        .map(|d| d.min(self.max_delay))
                        .unwrap_or_else(|| self.delay_for(attempt - 1));
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient failure"
                    );
                    crate::metrics::inc_retries(op_name);
                    tokio::time::sleep(delay).await;
                    debug!(op = op_name, attempt = attempt + 1, "retry attempt");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = quick_policy(3)
            .run("test", |_| true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = quick_policy(3)
            .run("test", |_| true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("always".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = quick_policy(5)
            .run("test", |_| false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("definitive".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hinted_delay_overrides_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let started = std::time::Instant::now();
        let result: Result<u32, String> = policy
            .run_hinted(
                "test",
                |_| true,
                |_| Some(Duration::from_millis(1)),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err("throttled".to_string())
                        } else {
                            Ok(7)
                        }
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The 30s backoff schedule must not apply when a hint is present.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn retry_knobs_count_retries_on_top_of_the_first_attempt() {
        let mut config = crate::config::Config::for_tests();
        config.nav_retries = 2;
        config.enrich_retries = 3;
        assert_eq!(RetryPolicy::navigation(&config).max_attempts, 3);
        assert_eq!(RetryPolicy::enrichment(&config).max_attempts, 4);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(10), Duration::from_millis(300));
    }
}

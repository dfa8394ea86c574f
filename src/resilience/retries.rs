//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is worth retrying (per-policy predicate)
//! - Execute attempts strictly one after another with exponential backoff + jitter
//! - Report every attempt to the stats collector exactly once
//! - Stop early when the caller cancels or the deadline passes
//!
//! # Design Decisions
//! - Backoff is a tokio sleep, never a blocking wait
//! - Classification is explicit: a predicate or the [`Retryable`] trait
//! - Exhaustion wraps the last error; permanent errors surface as-is

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::error::{RecoveryError, Retryable};
use crate::resilience::stats::StatsCollector;
use crate::resilience::timeouts::CallContext;

type Classifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Attempt limits, backoff shape and error classification for one call site.
pub struct RetryPolicy<E> {
    config: RetryConfig,
    classifier: Classifier<E>,
}

impl<E: 'static> RetryPolicy<E> {
    /// Policy with an explicit `is_retryable` predicate.
    pub fn new(
        config: RetryConfig,
        is_retryable: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            classifier: Arc::new(is_retryable),
        }
    }

    /// Treat every error as transient.
    pub fn retry_all(config: RetryConfig) -> Self {
        Self::new(config, |_| true)
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        let config = RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        };
        Self::new(config, |_| false)
    }
}

impl<E> RetryPolicy<E> {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.classifier)(error)
    }
}

impl<E: Retryable + 'static> RetryPolicy<E> {
    /// Classify with the error type's own [`Retryable`] impl.
    pub fn classified(config: RetryConfig) -> Self {
        Self::new(config, E::is_retryable)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            classifier: self.classifier.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One attempt's stats entry. Dropped unsettled (the caller abandoned the
/// call mid-attempt) it counts as a failure, so attempts stay balanced.
struct AttemptRecord<'a> {
    stats: &'a StatsCollector,
    key: &'a str,
    settled: bool,
}

impl<'a> AttemptRecord<'a> {
    fn start(stats: &'a StatsCollector, key: &'a str) -> Self {
        stats.record_attempt(key);
        Self {
            stats,
            key,
            settled: false,
        }
    }

    fn success(mut self) {
        self.stats.record_success(self.key);
        self.settled = true;
    }

    fn failure(mut self, error: impl Display) {
        self.stats.record_failure(self.key, error);
        self.settled = true;
    }
}

impl Drop for AttemptRecord<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.stats.record_failure(self.key, "abandoned");
        }
    }
}

/// Runs one logical call to completion under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    stats: Arc<StatsCollector>,
}

impl RetryExecutor {
    pub fn new(stats: Arc<StatsCollector>) -> Self {
        Self { stats }
    }

    /// Invoke `operation` until it succeeds, fails permanently, runs out of
    /// attempts or `ctx` cancels. Attempts are counted under `key`.
    pub async fn execute<T, E, F, Fut>(
        &self,
        key: &str,
        mut operation: F,
        policy: &RetryPolicy<E>,
        ctx: &CallContext,
    ) -> Result<T, RecoveryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = policy.config().max_attempts.max(1);
        let mut attempts = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(RecoveryError::Cancelled { attempts });
            }

            attempts += 1;
            let attempt = AttemptRecord::start(&self.stats, key);

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancelled() => None,
                result = operation() => Some(result),
            };

            let error = match outcome {
                Some(Ok(value)) => {
                    attempt.success();
                    return Ok(value);
                }
                Some(Err(error)) => {
                    attempt.failure(&error);
                    error
                }
                None => {
                    attempt.failure("cancelled");
                    return Err(RecoveryError::Cancelled { attempts });
                }
            };

            if !policy.is_retryable(&error) {
                return Err(RecoveryError::Permanent(error));
            }
            if attempts >= max_attempts {
                return Err(RecoveryError::Exhausted {
                    attempts,
                    last: error,
                });
            }

            let delay = calculate_backoff(attempts, policy.config());
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(RecoveryError::Cancelled { attempts }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::SystemClock;
    use crate::resilience::error::DependencyError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn executor() -> (RetryExecutor, Arc<StatsCollector>) {
        let stats = Arc::new(StatsCollector::new(Arc::new(SystemClock)));
        (RetryExecutor::new(stats.clone()), stats)
    }

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            jitter_ratio: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_with_growing_delays() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::<DependencyError>::classified(config(3));
        let calls: Mutex<Vec<Instant>> = Mutex::new(Vec::new());

        let result: Result<(), _> = executor
            .execute(
                "db",
                || {
                    calls.lock().unwrap().push(Instant::now());
                    async { Err(DependencyError::transient("timeout")) }
                },
                &policy,
                &CallContext::new(),
            )
            .await;

        match result {
            Err(RecoveryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, DependencyError::transient("timeout"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first = calls[1] - calls[0];
        let second = calls[2] - calls[1];
        assert!(first >= Duration::from_millis(100));
        assert!(second >= Duration::from_millis(200));
        assert!(second >= first);

        let db = stats.get("db").unwrap();
        assert_eq!((db.attempts, db.successes, db.failures), (3, 0, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_immediately() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::<DependencyError>::classified(config(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(
                "smtp",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(DependencyError::permanent("bad recipient")) }
                },
                &policy,
                &CallContext::new(),
            )
            .await;

        assert!(matches!(result, Err(RecoveryError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.get("smtp").unwrap().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::retry_all(config(5));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(
                "api",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("503")
                        } else {
                            Ok(n)
                        }
                    }
                },
                &policy,
                &CallContext::new(),
            )
            .await;

        assert_eq!(result.unwrap(), 2);
        let api = stats.get("api").unwrap();
        assert_eq!((api.attempts, api.successes, api.failures), (3, 1, 2));
        assert_eq!(api.last_error.as_deref(), Some("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let (executor, _) = executor();
        let policy = RetryPolicy::new(config(4), |code: &u16| *code >= 500);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(
                "payments",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err(if n == 0 { 502u16 } else { 404u16 }) }
                },
                &policy,
                &CallContext::new(),
            )
            .await;

        assert!(matches!(result, Err(RecoveryError::Permanent(404))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_is_not_exhaustion() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::retry_all(RetryConfig {
            base_delay_ms: 10_000,
            ..config(5)
        });
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_token(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result: Result<(), RecoveryError<&str>> = executor
            .execute("db", || async { Err("refused") }, &policy, &ctx)
            .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(RecoveryError::Cancelled { attempts: 1 })));
        let db = stats.get("db").unwrap();
        assert_eq!(db.attempts, db.successes + db.failures);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_in_flight_attempt() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::<&str>::retry_all(config(3));
        let ctx = CallContext::new().with_timeout(Duration::from_millis(500));

        let result: Result<(), _> = executor
            .execute(
                "slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                },
                &policy,
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(RecoveryError::Cancelled { attempts: 1 })));
        let slow = stats.get("slow").unwrap();
        assert_eq!((slow.attempts, slow.failures), (1, 1));
        assert_eq!(slow.last_error.as_deref(), Some("cancelled"));
    }

    // No `'static` bound on `E`.
    async fn fail_once<E: Display + Clone>(
        executor: &RetryExecutor,
        policy: &RetryPolicy<E>,
        error: E,
    ) -> Result<(), RecoveryError<E>> {
        executor
            .execute(
                "generic",
                || {
                    let error = error.clone();
                    async move { Err(error) }
                },
                policy,
                &CallContext::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_executor_accepts_unbounded_error_types() {
        let (executor, stats) = executor();
        let policy = RetryPolicy::<DependencyError>::classified(config(3));

        let result = fail_once(&executor, &policy, DependencyError::permanent("gone")).await;
        assert!(matches!(result, Err(RecoveryError::Permanent(_))));
        assert_eq!(policy.config().max_attempts, 3);
        assert_eq!(stats.get("generic").unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_invokes() {
        let (executor, stats) = executor();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_token(token);
        let calls = AtomicU32::new(0);

        let result: Result<(), RecoveryError<&str>> = executor
            .execute(
                "db",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                &RetryPolicy::retry_all(config(3)),
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(RecoveryError::Cancelled { attempts: 0 })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(stats.get("db").is_none());
    }
}

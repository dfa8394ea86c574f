//! Error recovery facade.
//!
//! Composes breaker gating with the retry executor for a dependency key and
//! exposes the read/reset operations the admin API is built on.
//!
//! # Call Flow
//! ```text
//! wrap(key, op, policy)
//!     → registry.get_or_create(key)
//!     → breaker.try_acquire()        denied → CircuitOpen (op never runs)
//!     → executor.execute(op, policy) attempts → stats
//!     → breaker.record_success/failure (final outcome only)
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use crate::config::RecoveryConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, Permit};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::error::RecoveryError;
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::{RetryExecutor, RetryPolicy};
use crate::resilience::stats::{RetryStats, StatsCollector};
use crate::resilience::timeouts::CallContext;

static GLOBAL: OnceLock<Arc<ErrorRecovery>> = OnceLock::new();

/// Process-wide owner of breakers and retry statistics.
#[derive(Debug)]
pub struct ErrorRecovery {
    registry: BreakerRegistry,
    stats: Arc<StatsCollector>,
    executor: RetryExecutor,
}

/// Settles the breaker permit if the `wrap` future is dropped mid-call.
struct PermitGuard {
    breaker: Arc<CircuitBreaker>,
    permit: Permit,
    settled: bool,
}

impl PermitGuard {
    fn settle<T, E>(mut self, result: &Result<T, RecoveryError<E>>) {
        match result {
            Ok(_) => self.breaker.record_success(self.permit),
            Err(RecoveryError::Cancelled { .. }) => self.breaker.release(self.permit),
            Err(_) => self.breaker.record_failure(self.permit),
        }
        self.settled = true;
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.permit);
        }
    }
}

impl ErrorRecovery {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RecoveryConfig, clock: Arc<dyn Clock>) -> Self {
        let stats = Arc::new(StatsCollector::new(clock.clone()));
        Self {
            registry: BreakerRegistry::new(config.breaker, config.breakers.clone(), clock),
            executor: RetryExecutor::new(stats.clone()),
            stats,
        }
    }

    /// The process-wide instance. Built from defaults unless
    /// [`install_global`](Self::install_global) ran first.
    pub fn global() -> Arc<ErrorRecovery> {
        GLOBAL
            .get_or_init(|| Arc::new(ErrorRecovery::new(&RecoveryConfig::default())))
            .clone()
    }

    /// Install the process-wide instance. Fails (handing the argument back)
    /// if one is already in place.
    pub fn install_global(instance: Arc<ErrorRecovery>) -> Result<(), Arc<ErrorRecovery>> {
        GLOBAL.set(instance)
    }

    /// Run `operation` under `key`'s breaker with `policy`.
    pub async fn wrap<T, E, F, Fut>(
        &self,
        key: &str,
        operation: F,
        policy: &RetryPolicy<E>,
    ) -> Result<T, RecoveryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.wrap_with(key, operation, policy, &CallContext::new()).await
    }

    /// [`wrap`](Self::wrap) with a deadline and/or abort signal.
    ///
    /// An admitted call settles its breaker permit exactly once: success,
    /// failure, or a release when `ctx` cancels. Retry statistics are per attempt,
    /// so a call that never runs an attempt (refused with
    /// [`RecoveryError::CircuitOpen`], or cancelled before the first attempt)
    /// leaves the [`StatsCollector`] untouched.
    pub async fn wrap_with<T, E, F, Fut>(
        &self,
        key: &str,
        operation: F,
        policy: &RetryPolicy<E>,
        ctx: &CallContext,
    ) -> Result<T, RecoveryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let breaker = self.registry.get_or_create(key);

        let permit = match breaker.try_acquire() {
            Ok(permit) => permit,
            Err(denied) => {
                let err = RecoveryError::CircuitOpen {
                    key: key.to_string(),
                    opened_at: denied.opened_at,
                    retry_after: denied.retry_after,
                };
                record_call(&breaker, err.kind());
                return Err(err);
            }
        };

        let guard = PermitGuard {
            breaker: breaker.clone(),
            permit,
            settled: false,
        };
        let result = self.executor.execute(key, operation, policy, ctx).await;
        guard.settle(&result);

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        record_call(&breaker, outcome);
        result
    }

    pub fn registry(&self) -> &BreakerRegistry {
        &self.registry
    }

    /// Breaker for `key`, created if needed.
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        self.registry.get_or_create(key)
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn get_circuit_breaker_states(&self) -> BTreeMap<String, CircuitBreakerSnapshot> {
        self.registry.snapshot()
    }

    pub fn get_retry_stats(&self) -> BTreeMap<String, RetryStats> {
        self.stats.snapshot()
    }

    /// Force every breaker Closed. Returns how many were reset.
    ///
    /// Each breaker resets atomically; the sweep across keys does not, so a
    /// breaker registered or tripped while the sweep runs may be missed.
    pub fn reset_circuit_breakers(&self) -> usize {
        let count = self.registry.reset_all();
        for snapshot in self.registry.snapshot().values() {
            record_state(&snapshot.key, snapshot.state.as_gauge());
        }
        count
    }

    /// Force one breaker Closed. Unknown keys are a no-op returning `false`.
    pub fn reset_circuit_breaker(&self, key: &str) -> bool {
        let found = self.registry.reset(key);
        if found {
            record_state(key, 0.0);
        }
        found
    }

    /// Drop every breaker and every stats entry.
    pub fn clear(&self) {
        self.registry.clear();
        self.stats.clear();
    }
}

fn record_call(breaker: &CircuitBreaker, outcome: &'static str) {
    metrics::counter!(
        "recovery_calls_total",
        "key" => breaker.key().to_string(),
        "outcome" => outcome
    )
    .increment(1);
    record_state(breaker.key(), breaker.state().as_gauge());
}

fn record_state(key: &str, value: f64) {
    metrics::gauge!("recovery_breaker_state", "key" => key.to_string()).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerConfig, RetryConfig};
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::clock::ManualClock;
    use crate::resilience::error::DependencyError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn recovery(failure_threshold: u32) -> (ErrorRecovery, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let config = RecoveryConfig {
            breaker: BreakerConfig {
                failure_threshold,
                cooldown_ms: 1_000,
                half_open_trial_size: 1,
                success_threshold: 1,
            },
            ..RecoveryConfig::default()
        };
        (ErrorRecovery::with_clock(&config, Arc::new(clock.clone())), clock)
    }

    fn single_attempt() -> RetryPolicy<DependencyError> {
        RetryPolicy::classified(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    #[tokio::test]
    async fn test_breaker_sees_final_outcome_only() {
        let (recovery, _) = recovery(2);
        let policy = RetryPolicy::<DependencyError>::classified(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter_ratio: 0.0,
        });
        let calls = AtomicU32::new(0);

        let result = recovery
            .wrap(
                "db",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(DependencyError::transient("busy"))
                        } else {
                            Ok("row")
                        }
                    }
                },
                &policy,
            )
            .await;

        assert_eq!(result.unwrap(), "row");
        // Two failed attempts, yet the breaker only saw one success.
        let state = &recovery.get_circuit_breaker_states()["db"];
        assert_eq!(state.state, CircuitState::Closed);
        assert_eq!(state.failure_count, 0);
        assert_eq!(recovery.get_retry_stats()["db"].attempts, 3);
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast() {
        let (recovery, clock) = recovery(1);
        let policy = single_attempt();

        let _ = recovery
            .wrap(
                "smtp",
                || async { Err::<(), _>(DependencyError::transient("down")) },
                &policy,
            )
            .await;

        clock.advance(Duration::from_millis(300));
        let calls = AtomicU32::new(0);
        let result = recovery
            .wrap(
                "smtp",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                &policy,
            )
            .await;

        match result {
            Err(RecoveryError::CircuitOpen {
                key,
                opened_at,
                retry_after,
            }) => {
                assert_eq!(key, "smtp");
                assert_eq!(opened_at, Some(1_000_000));
                assert_eq!(retry_after, Duration::from_millis(700));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(recovery.get_retry_stats()["smtp"].attempts, 1);
    }

    #[tokio::test]
    async fn test_dropped_call_releases_trial_slot() {
        let (recovery, clock) = recovery(1);
        let policy = single_attempt();
        let _ = recovery
            .wrap(
                "api",
                || async { Err::<(), _>(DependencyError::transient("down")) },
                &policy,
            )
            .await;
        clock.advance(Duration::from_secs(1));

        let pending = recovery.wrap(
            "api",
            std::future::pending::<Result<(), DependencyError>>,
            &policy,
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        let result = recovery.wrap("api", || async { Ok(()) }, &policy).await;
        assert!(result.is_ok());
        assert_eq!(recovery.breaker("api").state(), CircuitState::Closed);

        let api = &recovery.get_retry_stats()["api"];
        assert_eq!(api.attempts, 3);
        assert_eq!(api.successes + api.failures, api.attempts);
    }

    type Call = tokio::task::JoinHandle<Result<(), RecoveryError<DependencyError>>>;

    /// Spawn a call on "db" that succeeds once `finish` fires. `started`
    /// resolves when the operation is running.
    fn spawn_held_call(
        recovery: &Arc<ErrorRecovery>,
    ) -> (Call, oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started) = oneshot::channel();
        let (finish, finish_rx) = oneshot::channel::<()>();
        let recovery = recovery.clone();
        let task = tokio::spawn(async move {
            let mut started_tx = Some(started_tx);
            let mut finish_rx = Some(finish_rx);
            recovery
                .wrap(
                    "db",
                    move || {
                        if let Some(tx) = started_tx.take() {
                            let _ = tx.send(());
                        }
                        let finish_rx = finish_rx.take();
                        async move {
                            if let Some(rx) = finish_rx {
                                let _ = rx.await;
                            }
                            Ok(())
                        }
                    },
                    &single_attempt(),
                )
                .await
        });
        (task, started, finish)
    }

    #[tokio::test]
    async fn test_call_admitted_while_closed_cannot_settle_trial() {
        let (recovery, clock) = recovery(1);
        let recovery = Arc::new(recovery);

        let (slow, slow_started, slow_finish) = spawn_held_call(&recovery);
        slow_started.await.unwrap();

        let _ = recovery
            .wrap(
                "db",
                || async { Err::<(), _>(DependencyError::transient("down")) },
                &single_attempt(),
            )
            .await;
        clock.advance(Duration::from_secs(1));

        let (trial, trial_started, trial_finish) = spawn_held_call(&recovery);
        trial_started.await.unwrap();
        assert_eq!(recovery.breaker("db").state(), CircuitState::HalfOpen);

        slow_finish.send(()).unwrap();
        assert!(slow.await.unwrap().is_ok());

        // The only trial slot is still held by the real trial.
        let refused = recovery
            .wrap("db", || async { Ok::<_, DependencyError>(()) }, &single_attempt())
            .await;
        assert!(refused.unwrap_err().is_circuit_open());
        assert_eq!(recovery.breaker("db").state(), CircuitState::HalfOpen);

        trial_finish.send(()).unwrap();
        assert!(trial.await.unwrap().is_ok());
        assert_eq!(recovery.breaker("db").state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset_unknown_key_is_noop() {
        let (recovery, _) = recovery(1);
        assert!(!recovery.reset_circuit_breaker("nope"));
        assert!(recovery.get_circuit_breaker_states().is_empty());
    }

    #[tokio::test]
    async fn test_clear_forgets_everything() {
        let (recovery, _) = recovery(1);
        let _ = recovery
            .wrap("db", || async { Ok::<_, DependencyError>(1) }, &single_attempt())
            .await;

        recovery.clear();
        assert!(recovery.get_circuit_breaker_states().is_empty());
        assert!(recovery.get_retry_stats().is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        let a = ErrorRecovery::global();
        let b = ErrorRecovery::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

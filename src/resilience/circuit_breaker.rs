//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first allow() after cooldown_ms (lazy, no timer)
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any trial failure
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global)
//! - One mutex per breaker; every check-and-transition happens under it
//! - Counters reset on every transition; `opened_at` only set while Open
//! - Permits carry a state generation; completions from an earlier state
//!   (including anything observed while Open) are ignored

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::config::BreakerConfig;
use crate::resilience::clock::Clock;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Point-in-time copy of a breaker, as exposed by the admin API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSnapshot {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Epoch milliseconds of the transition to Open, `None` otherwise.
    pub opened_at: Option<u64>,
    pub config: BreakerConfig,
}

/// Why a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    pub opened_at: Option<u64>,
    /// Time until a trial call becomes eligible. Zero when Half-Open with
    /// every trial slot taken.
    pub retry_after: Duration,
}


/// Permission for one call, tied to the breaker state it was granted in.
///
/// Hand it back through [`CircuitBreaker::record_success`],
/// [`record_failure`](CircuitBreaker::record_failure) or
/// [`release`](CircuitBreaker::release). Outcomes carried by a permit from an
/// earlier state are ignored, so a slow call admitted while Closed can neither
/// decide nor widen a later Half-Open trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a permit must be reported back to the breaker"]
pub struct Permit {
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<u64>,
    trials_in_flight: u32,
    /// Bumped on every transition and reset.
    generation: u64,
}

impl Inner {
    fn closed(generation: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            trials_in_flight: 0,
            generation,
        }
    }

    fn transition(&mut self, to: CircuitState, now_ms: u64) {
        self.state = to;
        self.failure_count = 0;
        self.success_count = 0;
        self.trials_in_flight = 0;
        self.opened_at = (to == CircuitState::Open).then_some(now_ms);
        self.generation += 1;
    }

    fn permit(&self) -> Permit {
        Permit {
            generation: self.generation,
        }
    }

    fn is_current(&self, permit: Permit) -> bool {
        permit.generation == self.generation
    }
}

/// A single dependency's breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: key.into(),
            config,
            clock,
            inner: Mutex::new(Inner::closed(0)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask permission for one call. May move Open → Half-Open as a side effect.
    /// `None` means the call must not run.
    pub fn allow(&self) -> Option<Permit> {
        self.try_acquire().ok()
    }

    /// Like [`allow`](Self::allow), but reports why a call was refused.
    pub fn try_acquire(&self) -> Result<Permit, Denied> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Ok(inner.permit()),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_sub(opened_at);
                if elapsed < self.config.cooldown_ms {
                    return Err(Denied {
                        opened_at: Some(opened_at),
                        retry_after: Duration::from_millis(self.config.cooldown_ms - elapsed),
                    });
                }
                inner.transition(CircuitState::HalfOpen, now);
                inner.trials_in_flight = 1;
                Ok(inner.permit())
            }
            CircuitState::HalfOpen => {
                if inner.trials_in_flight < self.config.half_open_trial_size {
                    inner.trials_in_flight += 1;
                    Ok(inner.permit())
                } else {
                    Err(Denied {
                        opened_at: None,
                        retry_after: Duration::ZERO,
                    })
                }
            }
        }
    }

    /// Report a successful call.
    pub fn record_success(&self, permit: Permit) {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        if !inner.is_current(permit) {
            return;
        }

        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Report a failed call.
    pub fn record_failure(&self, permit: Permit) {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        if !inner.is_current(permit) {
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.transition(CircuitState::Open, now);
                }
            }
            // One failed trial aborts the whole trial.
            CircuitState::HalfOpen => inner.transition(CircuitState::Open, now),
            CircuitState::Open => {}
        }
    }

    /// Give back a permit without reporting an outcome (cancelled call).
    pub fn release(&self, permit: Permit) {
        let mut inner = self.lock();
        if inner.is_current(permit) && inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    /// Force Closed with all counters zeroed. Outstanding permits go stale.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let generation = inner.generation + 1;
        *inner = Inner::closed(generation);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock();
        CircuitBreakerSnapshot {
            key: self.key.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            opened_at: inner.opened_at,
            config: self.config,
        }
    }
}

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a dependency:
//!     → recovery.rs (facade: look up breaker, gate, delegate)
//!     → circuit_breaker.rs (fail fast while open, probe when half-open)
//!     → retries.rs (retry transient failures with backoff.rs delays)
//!     → timeouts.rs (caller deadline / abort stops the loop)
//!     → stats.rs (per-attempt counters for the admin API)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency key, created lazily by registry.rs
//! - Breakers observe one outcome per call; stats observe every attempt
//! - Open → Half-Open is a timestamp check on the next call, no timers
//! - No logging from here; outcomes are returned, counted, and metered

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod recovery;
pub mod registry;
pub mod retries;
pub mod stats;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState, Denied, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DependencyError, RecoveryError, Retryable};
pub use recovery::ErrorRecovery;
pub use registry::BreakerRegistry;
pub use retries::{RetryExecutor, RetryPolicy};
pub use stats::{RetryStats, StatsCollector};
pub use timeouts::CallContext;

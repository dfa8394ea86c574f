//! Terminal outcomes of a protected call and error classification.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Every way a call through [`ErrorRecovery`](crate::resilience::ErrorRecovery) can fail.
///
/// `E` is the dependency's own error type.
#[derive(Debug, Error)]
pub enum RecoveryError<E> {
    /// The breaker refused the call; the dependency was never contacted.
    #[error("circuit open for `{key}`, next probe in {}ms", .retry_after.as_millis())]
    CircuitOpen {
        key: String,
        opened_at: Option<u64>,
        retry_after: Duration,
    },

    /// Classified non-retryable; surfaced on first occurrence.
    #[error("permanent failure: {0}")]
    Permanent(#[source] E),

    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The caller's deadline or abort signal fired mid-call.
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RecoveryError<E> {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryError::CircuitOpen { .. } => "circuit_open",
            RecoveryError::Permanent(_) => "permanent",
            RecoveryError::Exhausted { .. } => "exhausted",
            RecoveryError::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RecoveryError::CircuitOpen { .. })
    }

    /// The underlying dependency error, if one was observed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RecoveryError::Permanent(e) | RecoveryError::Exhausted { last: e, .. } => Some(e),
            RecoveryError::CircuitOpen { .. } | RecoveryError::Cancelled { .. } => None,
        }
    }
}

/// Error types that know whether retrying them can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Tagged dependency failure for callers without their own error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),
}

impl DependencyError {
    pub fn transient(msg: impl Into<String>) -> Self {
        DependencyError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        DependencyError::Permanent(msg.into())
    }
}

impl Retryable for DependencyError {
    fn is_retryable(&self) -> bool {
        matches!(self, DependencyError::Transient(_))
    }
}

impl Retryable for io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }
}

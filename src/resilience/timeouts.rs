//! Deadlines and abort signals for protected calls.
//!
//! A [`CallContext`] travels with one `wrap` call. When its token is cancelled
//! or its deadline passes, the retry loop stops at the next await point (an
//! in-flight attempt is dropped, a pending backoff sleep is abandoned).

use std::future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never cancels.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        let aborted = self.token.as_ref().is_some_and(CancellationToken::is_cancelled);
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        aborted || expired
    }

    /// Resolves once the token fires or the deadline passes. Never resolves
    /// for a context with neither.
    pub async fn cancelled(&self) {
        let aborted = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            _ = aborted => {}
            _ = expired => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_context_never_cancels() {
        let ctx = CallContext::new();
        assert!(!ctx.is_cancelled());
        let fired = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_token_cancels() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_token(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
        ctx.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());

        let start = Instant::now();
        ctx.cancelled().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(ctx.is_cancelled());
    }
}

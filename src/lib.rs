//! Dependency error recovery: per-dependency circuit breakers, bounded retries
//! with backoff, and an admin API over their state.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::RecoveryConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CallContext, ErrorRecovery, RecoveryError, RetryPolicy};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admin server, binaries:
//!     → logging.rs (structured log events via tracing)
//!
//! Resilience core:
//!     → metrics.rs (call outcome counters, breaker state gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The resilience core never logs; it only updates metrics
//! - RUST_LOG overrides the configured level

pub mod logging;
pub mod metrics;

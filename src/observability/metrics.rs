//! Metrics collection and exposition.
//!
//! # Metrics
//! - `recovery_calls_total` (counter): protected calls by key and outcome
//!   (`success`, `circuit_open`, `permanent`, `exhausted`, `cancelled`)
//! - `recovery_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! The facade records through the `metrics` macros; without an installed
//! recorder those calls are no-ops.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "recovery_calls_total",
        "Protected dependency calls by key and outcome"
    );
    metrics::describe_gauge!(
        "recovery_breaker_state",
        "Circuit breaker state per key (0=closed, 1=open, 2=half-open)"
    );
}

//! Error recovery admin service.
//!
//! ```text
//!     ┌──────────────────────┐         ┌────────────────────────────────────┐
//!     │ route handlers, jobs │──wrap──▶│ ErrorRecovery (global)             │
//!     └──────────────────────┘         │  registry → breaker per dependency │
//!                                      │  retry executor → stats            │
//!     ┌──────────────────────┐         └──────────────────┬─────────────────┘
//!     │ ops dashboard / CLI  │──HTTP──▶ admin router ─────┘ read / reset
//!     └──────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use error_recovery::config::{load_config, RecoveryConfig};
use error_recovery::lifecycle::signals::shutdown_on_signal;
use error_recovery::observability::{logging, metrics};
use error_recovery::{ErrorRecovery, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "error-recovery")]
#[command(about = "Circuit breaker and retry administration service", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "ERROR_RECOVERY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RecoveryConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "error-recovery starting");

    tracing::info!(
        bind_address = %config.admin.bind_address,
        failure_threshold = config.breaker.failure_threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        overrides = config.breakers.len(),
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let recovery = Arc::new(ErrorRecovery::new(&config));
    if ErrorRecovery::install_global(recovery.clone()).is_err() {
        tracing::warn!("Global error recovery instance already installed");
    }

    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for admin connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, recovery);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_on_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

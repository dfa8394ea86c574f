//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the admin handlers
//! - Wire up middleware (tracing, request ID, timeout, panic capture)
//! - Bind server to listener and drain on shutdown

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::handlers::AdminError;
use crate::admin::setup_admin_router;
use crate::config::RecoveryConfig;
use crate::resilience::ErrorRecovery;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub recovery: Arc<ErrorRecovery>,
    pub api_key: Option<Arc<str>>,
}

/// Admin HTTP server.
pub struct HttpServer {
    router: Router,
    config: RecoveryConfig,
}

impl HttpServer {
    /// Create a new HTTP server over `recovery`.
    pub fn new(config: RecoveryConfig, recovery: Arc<ErrorRecovery>) -> Self {
        let state = AppState {
            recovery,
            api_key: config.admin.api_key.as_deref().map(Arc::from),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RecoveryConfig, state: AppState) -> Router {
        setup_admin_router(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.admin.request_timeout_secs),
            ))
            .layer(middleware::map_response(timeout_envelope))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router with every layer applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Admin server draining");
            })
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(details = %details, "Admin handler panicked");

    AdminError::Internal {
        error: "Internal server error".to_string(),
        details,
    }
    .into_response()
}

/// The timeout layer answers with an empty 408; give it the usual error body.
async fn timeout_envelope(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::warn!("Admin request timed out");
    AdminError::Timeout.into_response()
}

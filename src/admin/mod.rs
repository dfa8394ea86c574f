//! Administrative HTTP surface.
//!
//! Read-only views of breaker state and retry statistics plus the two reset
//! operations. Every failure is rendered as `{ error, details }`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/circuit-breakers", get(get_circuit_breakers))
        .route("/reset-all-circuit-breakers", post(reset_all_circuit_breakers))
        .route("/reset-circuit-breaker", post(reset_circuit_breaker))
        .route("/retry-stats", get(get_retry_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/health", get(get_health))
        .merge(protected)
        .with_state(state)
}

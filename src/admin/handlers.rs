use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::server::AppState;
use crate::resilience::{CircuitBreakerSnapshot, RetryStats};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct CircuitBreakersResponse {
    pub success: bool,
    pub states: BTreeMap<String, CircuitBreakerSnapshot>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct RetryStatsResponse {
    pub success: bool,
    pub stats: BTreeMap<String, RetryStats>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub key: Option<String>,
}

/// Wire envelope for every admin failure: `{ error, details }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

/// Admin API failures. Only the envelope reaches the client.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{error}: {details}")]
    BadRequest { error: String, details: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("request timed out")]
    Timeout,

    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AdminError::BadRequest { error, details } => (StatusCode::BAD_REQUEST, error, details),
            AdminError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                "missing or invalid bearer token".to_string(),
            ),
            AdminError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "Request timed out".to_string(),
                "the request exceeded admin.request_timeout_secs".to_string(),
            ),
            AdminError::Internal { error, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, error, details)
            }
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<CircuitBreakersResponse> {
    Json(CircuitBreakersResponse {
        success: true,
        states: state.recovery.get_circuit_breaker_states(),
        timestamp: timestamp(),
    })
}

pub async fn reset_all_circuit_breakers(State(state): State<AppState>) -> Json<MessageResponse> {
    let count = state.recovery.reset_circuit_breakers();
    tracing::info!(count, "All circuit breakers reset via admin API");

    Json(MessageResponse {
        success: true,
        message: format!("Reset {count} circuit breakers to CLOSED"),
        timestamp: timestamp(),
    })
}

pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AdminError> {
    let request: ResetRequest =
        serde_json::from_slice(&body).map_err(|e| AdminError::BadRequest {
            error: "Invalid request body".to_string(),
            details: e.to_string(),
        })?;

    let key = match request.key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return Err(AdminError::BadRequest {
                error: "Circuit breaker key is required".to_string(),
                details: "body must be {\"key\": \"<dependency>\"}".to_string(),
            })
        }
    };

    let found = state.recovery.reset_circuit_breaker(&key);
    tracing::info!(key = %key, found, "Circuit breaker reset via admin API");

    let message = if found {
        format!("Circuit breaker '{key}' reset to CLOSED")
    } else {
        format!("No circuit breaker registered for '{key}'; nothing to reset")
    };
    Ok(Json(MessageResponse {
        success: true,
        message,
        timestamp: timestamp(),
    }))
}

pub async fn get_retry_stats(State(state): State<AppState>) -> Json<RetryStatsResponse> {
    Json(RetryStatsResponse {
        success: true,
        stats: state.recovery.get_retry_stats(),
        timestamp: timestamp(),
    })
}

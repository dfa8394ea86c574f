//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use error_recovery::config::{BreakerConfig, RecoveryConfig, RetryConfig};
use error_recovery::resilience::{DependencyError, ManualClock};
use error_recovery::{ErrorRecovery, RetryPolicy};
use serde_json::Value;
use tower::ServiceExt;

pub const START_MS: u64 = 1_700_000_000_000;

/// Facade driven by a manual clock.
pub fn recovery_with(breaker: BreakerConfig) -> (Arc<ErrorRecovery>, ManualClock) {
    let clock = ManualClock::new(START_MS);
    let config = RecoveryConfig {
        breaker,
        ..RecoveryConfig::default()
    };
    let recovery = ErrorRecovery::with_clock(&config, Arc::new(clock.clone()));
    (Arc::new(recovery), clock)
}

/// One attempt, classification by error tag.
pub fn single_attempt() -> RetryPolicy<DependencyError> {
    RetryPolicy::classified(RetryConfig {
        max_attempts: 1,
        base_delay_ms: 1,
        max_delay_ms: 1,
        jitter_ratio: 0.0,
    })
}

pub async fn fail(recovery: &ErrorRecovery, key: &str) {
    let _ = recovery
        .wrap(
            key,
            || async { Err::<(), _>(DependencyError::transient("unavailable")) },
            &single_attempt(),
        )
        .await;
}

pub async fn succeed(recovery: &ErrorRecovery, key: &str) {
    let _ = recovery
        .wrap(key, || async { Ok::<_, DependencyError>(()) }, &single_attempt())
        .await;
}

/// Send one request through `router` and decode the JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

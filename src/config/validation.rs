//! Configuration validation.
//!
//! Serde handles the syntactic side; this catches values that parse but make
//! no sense (zero thresholds, jitter outside [0, 1], unparseable addresses).
//! Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, RecoveryConfig, RetryConfig};

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{section}.{field} must be at least 1")]
    ZeroThreshold { section: String, field: &'static str },

    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retry.jitter_ratio must be within [0, 1], got {0}")]
    JitterOutOfRange(f64),

    #[error("retry.base_delay_ms ({base}) exceeds retry.max_delay_ms ({max})")]
    DelayBounds { base: u64, max: u64 },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &RecoveryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_breaker("breaker", &config.breaker, &mut errors);
    let mut keys: Vec<_> = config.breakers.keys().collect();
    keys.sort();
    for key in keys {
        check_breaker(&format!("breakers.{key}"), &config.breakers[key], &mut errors);
    }

    check_retry(&config.retry, &mut errors);

    if config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_breaker(section: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    let fields = [
        ("failure_threshold", breaker.failure_threshold),
        ("half_open_trial_size", breaker.half_open_trial_size),
        ("success_threshold", breaker.success_threshold),
    ];
    for (field, value) in fields {
        if value == 0 {
            errors.push(ValidationError::ZeroThreshold {
                section: section.to_string(),
                field,
            });
        }
    }
}

fn check_retry(retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if !(0.0..=1.0).contains(&retry.jitter_ratio) {
        errors.push(ValidationError::JitterOutOfRange(retry.jitter_ratio));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::DelayBounds {
            base: retry.base_delay_ms,
            max: retry.max_delay_ms,
        });
    }
}

//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Pre-jitter delay after failed attempt number `attempt` (1-based).
///
/// `min(max_ms, base_ms * 2^(attempt-1))`; non-decreasing in `attempt`.
pub fn exponential_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Scale `delay` by `1 - ratio + sample * 2 * ratio`, clamped at zero.
///
/// `sample` is expected in `[0, 1)`.
pub fn apply_jitter(delay: Duration, ratio: f64, sample: f64) -> Duration {
    let ratio = ratio.clamp(0.0, 1.0);
    let factor = (1.0 - ratio + sample * 2.0 * ratio).max(0.0);
    let ms = (delay.as_millis() as f64 * factor).round();
    Duration::from_millis(ms as u64)
}

/// Jittered delay after failed attempt `attempt` under `config`.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let delay = exponential_delay(attempt, config.base_delay_ms, config.max_delay_ms);
    if config.jitter_ratio <= 0.0 {
        return delay;
    }
    let sample: f64 = rand::thread_rng().gen();
    apply_jitter(delay, config.jitter_ratio, sample)
}

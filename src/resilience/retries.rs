//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (idempotent methods only)
//! - Compute exponential backoff with jitter between attempts
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent)
//! - Jittered backoff prevents thundering herd
//! - Connection errors and timeouts are always retryable; of the 5xx
//!   statuses only 502, 503 and 504

use std::time::Duration;

use axum::http::{Method, StatusCode};
use rand::Rng;

use crate::config::schema::RetryConfig;

/// Why an attempt failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Upstream answered with this status.
    Status(StatusCode),
    /// Could not connect, or the connection broke.
    Network,
    /// The per-route deadline elapsed.
    Timeout,
}

/// Returns true if another attempt may be made after `failure`.
pub fn is_retryable(method: &Method, failure: AttemptFailure) -> bool {
    if !method.is_idempotent() {
        return false;
    }
    match failure {
        AttemptFailure::Network | AttemptFailure::Timeout => true,
        AttemptFailure::Status(status) => matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ),
    }
}

/// Total attempts allowed for `method` under an optional route policy.
pub fn max_attempts(method: &Method, policy: Option<&RetryConfig>) -> u32 {
    match policy {
        Some(p) if method.is_idempotent() => p.max_attempts.max(1),
        _ => 1,
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is the number of attempts already made (1 before the first retry).
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponential).min(max_ms);

    // Jitter of up to 10% of the delay.
    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

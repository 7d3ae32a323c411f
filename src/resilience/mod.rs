//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → per-route timeout enforced by the forwarder (504 on expiry)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Retries are opt-in per route and only for idempotent requests

pub mod retries;

pub use retries::{calculate_backoff, is_retryable, max_attempts, AttemptFailure};

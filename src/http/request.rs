//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header shared with the backends
//! - Read the correlation id assigned by the request-id layer
//!
//! # Design Decisions
//! - Correlation id added as early as possible for tracing
//! - A client-supplied `X-Correlation-Id` is kept, otherwise a UUID v4 is set
//! - The same value goes upstream and comes back on the response

use axum::http::{HeaderMap, HeaderName};

/// Correlation header; generated when the client sends none.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// The request's correlation id, or `"unknown"` if unset or not ASCII.
pub fn correlation_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

//! Request admission limits.
//!
//! # Responsibilities
//! - Enforce `listener.max_in_flight` via a semaphore
//! - Hold a permit for the lifetime of each request
//! - Refuse bodies whose declared length exceeds `security.max_body_size`
//!
//! # Design Decisions
//! - When the limit is reached, new requests wait until a slot frees up
//! - The permit is released on drop, even if the handler panics or the
//!   client disconnects
//! - Declared lengths are checked here so the refusal uses the gateway's error
//!   envelope; streamed bodies are still capped by `RequestBodyLimitLayer`

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Semaphore;

use crate::http::error::GatewayError;

/// Shared request slots.
#[derive(Debug)]
pub struct InFlightLimit {
    slots: Arc<Semaphore>,
    max_in_flight: usize,
}

impl InFlightLimit {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Current free slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

/// Outermost gateway layer.
pub async fn in_flight_middleware(
    State(limit): State<Arc<InFlightLimit>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Acquire first (backpressure)
    let Ok(_permit) = limit.slots.clone().acquire_owned().await else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    next.run(request).await
}

/// Answer `413` before reading a body whose `Content-Length` is over `max_body_size`.
pub async fn content_length_guard(
    State(max_body_size): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(len) if len > max_body_size as u64 => GatewayError::PayloadTooLarge.into_response(),
        _ => next.run(request).await,
    }
}

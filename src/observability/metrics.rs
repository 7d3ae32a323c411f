//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_auth_denied_total` (counter): denials by route, kind
//! - `gateway_upstream_errors_total` (counter): failed upstream calls by route, kind
//!
//! # Design Decisions
//! - Macros are no-ops until a recorder is installed, so tests need no setup
//! - Prometheus endpoint only when `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count a finished request and record its latency.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Count a request the filter chain or route table refused.
pub fn record_denied(route: &str, kind: &'static str) {
    metrics::counter!("gateway_auth_denied_total", "route" => route.to_string(), "kind" => kind).increment(1);
}

/// Count an upstream call that ended in 502 or 504.
pub fn record_upstream_error(route: &str, kind: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "route" => route.to_string(), "kind" => kind).increment(1);
}

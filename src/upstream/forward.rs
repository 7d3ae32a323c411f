//! Forwarding an admitted request to its backend.
//!
//! # Responsibilities
//! - Rewrite the request head for the upstream hop
//! - Call the backend under the route's deadline
//! - Retry idempotent requests when the route opts in
//! - Strip hop-by-hop and `WWW-Authenticate` headers from the answer
//!
//! # Design Decisions
//! - The body streams through unless a retry may need it again
//! - Upstream is always spoken to over HTTP/1.1
//! - Dropping the returned future (client went away) drops the upstream call

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Version},
};
use http_body_util::LengthLimitError;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::schema::TimeoutConfig;
use crate::http::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::resilience::retries::{self, AttemptFailure};
use crate::upstream::registry::{upstream_uri, BackendRegistry};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers meaningful only for a single connection.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Prepare request headers for the upstream hop.
pub fn prepare_request_headers(headers: &mut HeaderMap, client_addr: Option<SocketAddr>) {
    strip_hop_by_hop(headers);

    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(addr) = client_addr {
        let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {}", addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

/// Clean an upstream response's headers before it leaves the gateway.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(header::WWW_AUTHENTICATE);
}

/// Returns true if the body limit tripped anywhere in `err`'s source chain.
pub fn exceeds_body_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn body_error(err: &axum::Error) -> GatewayError {
    if exceeds_body_limit(err) {
        GatewayError::PayloadTooLarge
    } else {
        GatewayError::RequestBody
    }
}

/// Upstream HTTP client plus backend lookup.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    registry: BackendRegistry,
    max_body_size: usize,
}

impl Forwarder {
    pub fn new(registry: BackendRegistry, timeouts: &TimeoutConfig, max_body_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            registry,
            max_body_size,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Send the request to the route's backend and return its response.
    pub async fn forward(
        &self,
        ctx: RequestContext<'_>,
        body: Body,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, GatewayError> {
        let RequestContext {
            mut parts,
            route,
            correlation_id,
            ..
        } = ctx;

        let base = self.registry.get(&route.backend).ok_or_else(|| {
            tracing::error!(
                correlation_id = %correlation_id,
                route = %route.id,
                backend = %route.backend,
                "Route references unknown backend"
            );
            GatewayError::UpstreamUnreachable
        })?;

        let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let uri = upstream_uri(base, path_and_query).map_err(|e| {
            tracing::warn!(correlation_id = %correlation_id, error = %e, "Cannot build upstream URI");
            GatewayError::UpstreamUnreachable
        })?;

        prepare_request_headers(&mut parts.headers, client_addr);

        let max_attempts = retries::max_attempts(&parts.method, route.retry.as_ref());

        // Buffer only when a second attempt might need the body again.
        let (buffered, mut streamed): (Option<Bytes>, Option<Body>) = if max_attempts > 1 {
            let bytes = axum::body::to_bytes(body, self.max_body_size).await.map_err(|e| {
                tracing::debug!(correlation_id = %correlation_id, error = %e, "Failed to read request body");
                body_error(&e)
            })?;
            (Some(bytes), None)
        } else {
            (None, Some(body))
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let attempt_body = match &buffered {
                Some(bytes) => Body::from(bytes.clone()),
                None => streamed.take().unwrap_or_else(Body::empty),
            };

            let mut request = Request::new(attempt_body);
            *request.method_mut() = parts.method.clone();
            *request.uri_mut() = uri.clone();
            *request.version_mut() = Version::HTTP_11;
            *request.headers_mut() = parts.headers.clone();

            let failure = match tokio::time::timeout(route.timeout, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if attempt < max_attempts && retries::is_retryable(&parts.method, AttemptFailure::Status(status)) {
                        AttemptFailure::Status(status)
                    } else {
                        let (mut head, incoming): (_, hyper::body::Incoming) = response.into_parts();
                        sanitize_response_headers(&mut head.headers);
                        return Ok(Response::from_parts(head, Body::new(incoming)));
                    }
                }
                Ok(Err(e)) if exceeds_body_limit(&e) => {
                    tracing::debug!(
                        correlation_id = %correlation_id,
                        route = %route.id,
                        limit = self.max_body_size,
                        "Request body over limit while streaming"
                    );
                    return Err(GatewayError::PayloadTooLarge);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        route = %route.id,
                        backend = %route.backend,
                        attempt,
                        error = %e,
                        "Upstream request failed"
                    );
                    AttemptFailure::Network
                }
                Err(_) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        route = %route.id,
                        backend = %route.backend,
                        attempt,
                        timeout_ms = route.timeout.as_millis() as u64,
                        "Upstream request timed out"
                    );
                    AttemptFailure::Timeout
                }
            };

            if attempt >= max_attempts || !retries::is_retryable(&parts.method, failure) {
                return Err(match failure {
                    AttemptFailure::Timeout => GatewayError::UpstreamTimeout,
                    _ => GatewayError::UpstreamUnreachable,
                });
            }

            let policy = route.retry.clone().unwrap_or_default();
            let delay = retries::calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
            tracing::info!(
                correlation_id = %correlation_id,
                route = %route.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                failure = ?failure,
                "Retrying upstream request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

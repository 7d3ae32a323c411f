//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler and health endpoint
//! - Wire up middleware (in-flight cap, correlation ids, tracing, CORS, body limit)
//! - Dispatch requests through the pipeline to the upstream forwarder
//! - Turn every failure into the JSON error envelope
//! - Record per-request metrics
//!
//! # Layer Order (outermost first)
//! ```text
//! in-flight limit → set correlation id → trace → propagate correlation id
//!     → CORS (answers OPTIONS) → declared-length guard → body limit → handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::http::error::GatewayError;
use crate::http::limit::{content_length_guard, in_flight_middleware, InFlightLimit};
use crate::http::request::{correlation_id, X_CORRELATION_ID};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::security::cors::{cors_middleware, CorsPolicy};
use crate::upstream::{BackendRegistry, Forwarder};

/// Answered by the gateway itself, never proxied.
pub const HEALTH_PATH: &str = "/__gateway/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Validate `config` and build every subsystem from it.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let pipeline = Arc::new(Pipeline::from_config(&config).map_err(ConfigError::Validation)?);
        let cors = Arc::new(CorsPolicy::from_config(&config.cors).map_err(ConfigError::Validation)?);
        let registry = BackendRegistry::from_config(&config.backends).map_err(ConfigError::Validation)?;
        let forwarder = Arc::new(Forwarder::new(registry, &config.timeouts, config.security.max_body_size));
        let limit = Arc::new(InFlightLimit::new(config.listener.max_in_flight));

        tracing::info!(
            routes = pipeline.table().len(),
            fallback = pipeline.table().fallback().is_some(),
            backends = forwarder.registry().len(),
            "Pipeline compiled"
        );

        let state = AppState { pipeline, forwarder };
        let router = Self::build_router(&config, state, cors, limit);

        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState, cors: Arc<CorsPolicy>, limit: Arc<InFlightLimit>) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health_handler).fallback(method_not_allowed))
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(middleware::from_fn_with_state(
                config.security.max_body_size,
                content_length_guard,
            ))
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(PropagateRequestIdLayer::new(X_CORRELATION_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    correlation_id = %correlation_id(request.headers()),
                )
            }))
            .layer(SetRequestIdLayer::new(X_CORRELATION_ID, MakeRequestUuid))
            .layer(middleware::from_fn_with_state(limit, in_flight_middleware))
    }

    /// A clone of the fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP" }))
}

async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

/// Resolve, filter, forward.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let correlation_id = correlation_id(request.headers()).to_owned();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();

    let (route_id, result) = match state.pipeline.resolve(&method, &path) {
        Ok(route) => {
            tracing::debug!(
                correlation_id = %correlation_id,
                route = %route.rule.id,
                backend = %route.rule.backend,
                "Route resolved"
            );
            let result = match route.admit(parts, correlation_id.as_str()) {
                Ok(ctx) => state.forwarder.forward(ctx, body, client_addr).await,
                Err(err) => Err(err),
            };
            (route.rule.id.as_str(), result)
        }
        Err(err) => (NO_ROUTE_LABEL, Err(err)),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            report(&err, route_id, &correlation_id, &method, &path);
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), route_id, start);
    response
}

/// Route label used when nothing matched.
const NO_ROUTE_LABEL: &str = "none";

fn report(err: &GatewayError, route: &str, correlation_id: &str, method: &axum::http::Method, path: &str) {
    match err {
        GatewayError::UpstreamTimeout | GatewayError::UpstreamUnreachable => {
            tracing::warn!(
                correlation_id = %correlation_id,
                route = %route,
                kind = err.kind(),
                "Upstream call failed"
            );
            metrics::record_upstream_error(route, err.kind());
        }
        GatewayError::NoRouteMatch => {
            tracing::warn!(correlation_id = %correlation_id, method = %method, path = %path, "No route matched");
            metrics::record_denied(route, err.kind());
        }
        _ => {
            tracing::debug!(
                correlation_id = %correlation_id,
                route = %route,
                kind = err.kind(),
                status = err.status().as_u16(),
                "Request rejected"
            );
            metrics::record_denied(route, err.kind());
        }
    }
}

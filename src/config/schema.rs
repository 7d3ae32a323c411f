//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, in-flight cap).
    pub listener: ListenerConfig,

    /// Token verification settings.
    pub jwt: JwtConfig,

    /// Cross-origin allow-list and preflight answers.
    pub cors: CorsConfig,

    /// Backend service definitions.
    pub backends: Vec<BackendConfig>,

    /// Ordered route table. Declaration order is match order.
    pub routes: Vec<RouteConfig>,

    /// Rule applied when no route matches. Absent means 404.
    pub fallback: Option<FallbackConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests processed concurrently (backpressure).
    pub max_in_flight: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_in_flight: 10_000,
        }
    }
}

/// JWT settings shared with the user service that issues tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC-SHA256 shared secret. Overridable with `GATEWAY_JWT_SECRET`.
    pub secret: String,

    /// Lifetime of access tokens in seconds.
    pub access_ttl_secs: u64,

    /// Lifetime of refresh tokens in seconds.
    pub refresh_ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_secs: 86_400,
            refresh_ttl_secs: 604_800,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed verbatim (e.g., "http://localhost:5173").
    pub allowed_origins: Vec<String>,

    /// Origins allowed on any port, written as `scheme://host:*`.
    pub allowed_origin_patterns: Vec<String>,

    /// Value of `Access-Control-Allow-Methods` on preflight answers.
    pub allowed_methods: Vec<String>,

    /// Value of `Access-Control-Allow-Headers` on preflight answers.
    pub allowed_headers: Vec<String>,

    /// Value of `Access-Control-Expose-Headers` on actual responses.
    pub exposed_headers: Vec<String>,

    /// `Access-Control-Max-Age` in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_origin_patterns: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: ["Authorization", "Content-Type", "X-Requested-With", "Accept", "X-Correlation-Id"]
                .into_iter()
                .map(String::from)
                .collect(),
            exposed_headers: ["Authorization", "X-User-Email", "X-User-Id", "X-User-Roles", "X-Correlation-Id"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_age_secs: 3600,
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier referenced by routes.
    pub name: String,

    /// Base URL (e.g., "http://127.0.0.1:8082").
    pub url: String,
}

/// Per-route authentication requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPolicy {
    /// A valid bearer token is mandatory.
    Required,
    /// A valid token enriches the request; anything else passes anonymously.
    Optional,
    /// Authentication is not consulted.
    None,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        AuthPolicy::Required
    }
}

impl std::fmt::Display for AuthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthPolicy::Required => write!(f, "required"),
            AuthPolicy::Optional => write!(f, "optional"),
            AuthPolicy::None => write!(f, "none"),
        }
    }
}

/// Route configuration mapping requests to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub id: String,

    /// Path patterns; the route matches when any of them matches.
    pub paths: Vec<String>,

    /// Allowed methods. Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Backend name to forward to.
    pub backend: String,

    /// Authentication policy.
    #[serde(default)]
    pub auth: AuthPolicy,

    /// Roles of which the caller must hold at least one (`required` only).
    #[serde(default)]
    pub required_roles: Vec<String>,

    /// Upstream timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Opt-in retry policy. Applied to idempotent methods only.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// Rule used when nothing in the route table matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Backend name to forward to.
    pub backend: String,

    /// Authentication policy for unmatched requests.
    #[serde(default)]
    pub auth: AuthPolicy,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Default upstream timeout (total time for request/response) in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

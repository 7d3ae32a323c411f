//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (secret length, timeouts, retry attempts)
//! - Reject routes that an earlier route fully shadows
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{AuthPolicy, GatewayConfig};
use crate::routing::{PatternError, RouteRule, RouteTable};
use crate::security::cors::CorsPolicy;
use crate::upstream::BackendRegistry;

/// HS256 keys shorter than the hash output are rejected.
pub const MIN_SECRET_LEN: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_in_flight must be greater than zero")]
    ZeroMaxInFlight,

    #[error("jwt.secret is not set")]
    MissingSecret,

    #[error("jwt.secret is {0} bytes, at least {MIN_SECRET_LEN} are required")]
    WeakSecret(usize),

    #[error("a route has an empty id")]
    EmptyRouteId,

    #[error("route id '{0}' is declared more than once")]
    DuplicateRoute(String),

    #[error("route '{0}' has no paths")]
    NoPaths(String),

    #[error("route '{route}': {source}")]
    InvalidPattern { route: String, source: PatternError },

    #[error("route '{route}': '{method}' is not an HTTP method")]
    InvalidMethod { route: String, method: String },

    #[error("route '{route}' references unknown backend '{backend}'")]
    UnknownBackend { route: String, backend: String },

    #[error("route '{0}' lists required_roles but its auth policy is not 'required'")]
    RolesWithoutRequiredPolicy(String),

    #[error("route '{route}' can never match: route '{by}' is declared earlier and matches everything it does")]
    ShadowedRoute { route: String, by: String },

    #[error("route '{0}' has a zero timeout")]
    ZeroTimeout(String),

    #[error("route '{0}' retry.max_attempts must be at least 1")]
    InvalidRetry(String),

    #[error("backend name '{0}' is declared more than once")]
    DuplicateBackend(String),

    #[error("backend '{backend}' url is invalid: {reason}")]
    InvalidBackendUrl { backend: String, reason: String },

    #[error("cors origin '{0}' must be an exact scheme://host[:port] value")]
    InvalidOrigin(String),

    #[error("cors origin pattern '{0}' must look like scheme://host:*")]
    InvalidOriginPattern(String),

    #[error("cors {field} value '{value}' is not a valid header value")]
    InvalidCorsHeader { field: &'static str, value: String },
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_in_flight == 0 {
        errors.push(ValidationError::ZeroMaxInFlight);
    }

    match config.jwt.secret.len() {
        0 => errors.push(ValidationError::MissingSecret),
        n if n < MIN_SECRET_LEN => errors.push(ValidationError::WeakSecret(n)),
        _ => {}
    }

    if let Err(e) = CorsPolicy::from_config(&config.cors) {
        errors.extend(e);
    }

    let backend_names: HashSet<&str> = match BackendRegistry::from_config(&config.backends) {
        Ok(_) => config.backends.iter().map(|b| b.name.as_str()).collect(),
        Err(e) => {
            errors.extend(e);
            config.backends.iter().map(|b| b.name.as_str()).collect()
        }
    };

    let default_timeout = Duration::from_secs(config.timeouts.upstream_secs);
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(config.routes.len());

    for route in &config.routes {
        if route.id.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteId);
        } else if !seen.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.id.clone()));
        }

        if !backend_names.contains(route.backend.as_str()) {
            errors.push(ValidationError::UnknownBackend {
                route: route.id.clone(),
                backend: route.backend.clone(),
            });
        }

        if !route.required_roles.is_empty() && route.auth != AuthPolicy::Required {
            errors.push(ValidationError::RolesWithoutRequiredPolicy(route.id.clone()));
        }

        if route.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroTimeout(route.id.clone()));
        }

        if route.retry.as_ref().is_some_and(|r| r.max_attempts == 0) {
            errors.push(ValidationError::InvalidRetry(route.id.clone()));
        }

        match RouteRule::from_config(route, default_timeout) {
            Ok(rule) => rules.push(rule),
            Err(e) => errors.extend(e),
        }
    }

    if let Some(fallback) = &config.fallback {
        if !backend_names.contains(fallback.backend.as_str()) {
            errors.push(ValidationError::UnknownBackend {
                route: crate::routing::FALLBACK_ROUTE_ID.to_string(),
                backend: fallback.backend.clone(),
            });
        }
    }

    for (route, by) in RouteTable::new(rules, None).shadowed() {
        errors.push(ValidationError::ShadowedRoute { route, by });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Request pipeline: route resolution plus per-route filter chains.
//!
//! # Data Flow
//! ```text
//! (method, path)
//!     → Pipeline::resolve (route table, then fallback, else NoRouteMatch)
//!     → Route::admit
//!         → Authenticate   (skipped for auth = none)
//!         → RequireRoles   (only when roles are configured)
//!         → EnrichIdentity (always)
//!     → RequestContext handed to the upstream forwarder
//! ```
//!
//! # Design Decisions
//! - Chains are composed once at startup from each rule
//! - The first filter that fails ends the request; later filters never run
//! - CORS is not part of any chain; it runs before resolution

pub mod filter;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{request::Parts, Method};

use crate::config::schema::{AuthPolicy, GatewayConfig};
use crate::config::validation::ValidationError;
use crate::http::error::GatewayError;
use crate::routing::{has_unsafe_segment, RouteRule, RouteTable};
use crate::security::token::TokenVerifier;

pub use filter::{Filter, RequestContext};

/// A route rule together with its compiled filter chain.
#[derive(Debug, Clone)]
pub struct Route {
    pub rule: RouteRule,
    pub filters: Vec<Filter>,
}

impl Route {
    /// Build the chain for `rule`.
    pub fn compose(rule: RouteRule, verifier: &Arc<TokenVerifier>) -> Self {
        let mut filters = Vec::with_capacity(3);
        if rule.auth_policy != AuthPolicy::None {
            filters.push(Filter::Authenticate {
                policy: rule.auth_policy,
                verifier: Arc::clone(verifier),
            });
        }
        if !rule.required_roles.is_empty() {
            filters.push(Filter::RequireRoles(rule.required_roles.clone()));
        }
        filters.push(Filter::EnrichIdentity);
        Self { rule, filters }
    }

    /// Run the chain over a request head.
    pub fn admit(&self, parts: Parts, correlation_id: impl Into<String>) -> Result<RequestContext<'_>, GatewayError> {
        let mut ctx = RequestContext::new(parts, &self.rule, correlation_id);
        for filter in &self.filters {
            if let Err(err) = filter.apply(&mut ctx) {
                tracing::debug!(
                    correlation_id = %ctx.correlation_id,
                    route = %self.rule.id,
                    filter = filter.name(),
                    kind = err.kind(),
                    "Request denied"
                );
                return Err(err);
            }
        }
        Ok(ctx)
    }
}

impl AsRef<RouteRule> for Route {
    fn as_ref(&self) -> &RouteRule {
        &self.rule
    }
}

/// Immutable pipeline shared by every request.
#[derive(Debug)]
pub struct Pipeline {
    table: RouteTable<Route>,
}

impl Pipeline {
    /// Compile routes, fallback and filter chains from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, Vec<ValidationError>> {
        let verifier = Arc::new(TokenVerifier::new(&config.jwt.secret));
        let default_timeout = Duration::from_secs(config.timeouts.upstream_secs);

        let mut errors = Vec::new();
        let mut routes = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            match RouteRule::from_config(route, default_timeout) {
                Ok(rule) => routes.push(Route::compose(rule, &verifier)),
                Err(e) => errors.extend(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let fallback = config
            .fallback
            .as_ref()
            .map(|f| Route::compose(RouteRule::fallback(f, default_timeout), &verifier));

        Ok(Self::new(RouteTable::new(routes, fallback)))
    }

    pub fn new(table: RouteTable<Route>) -> Self {
        Self { table }
    }

    /// Route for the request, the fallback, or `NoRouteMatch`.
    ///
    /// Paths with dot segments or encoded separators never reach matching.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<&Route, GatewayError> {
        if has_unsafe_segment(path) {
            return Err(GatewayError::InvalidPath);
        }
        self.table.resolve(method, path).ok_or(GatewayError::NoRouteMatch)
    }

    pub fn table(&self) -> &RouteTable<Route> {
        &self.table
    }
}

//! Route rules and the ordered route table.
//!
//! # Responsibilities
//! - Store compiled route rules in declaration order
//! - Look up the first rule matching a request
//! - Fall back to a configured catch-all rule, or report no match
//! - Report rules that can never match because an earlier rule wins
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; first match wins, no best-match scoring
//! - Deterministic: same (method, path) always resolves to the same rule

use std::time::Duration;

use axum::http::Method;

use crate::config::schema::{AuthPolicy, FallbackConfig, RetryConfig, RouteConfig};
use crate::config::validation::ValidationError;
use crate::routing::pattern::PathPattern;

/// Identifier given to the synthesized fallback rule.
pub const FALLBACK_ROUTE_ID: &str = "fallback";

/// A compiled route rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Route identifier for logging/metrics.
    pub id: String,
    /// Path patterns; any one matching satisfies the path predicate.
    pub patterns: Vec<PathPattern>,
    /// Allowed methods. Empty means any.
    pub methods: Vec<Method>,
    /// Backend name to forward to.
    pub backend: String,
    pub auth_policy: AuthPolicy,
    /// The caller must hold at least one of these roles.
    pub required_roles: Vec<String>,
    /// Upstream timeout.
    pub timeout: Duration,
    /// Opt-in retry policy for idempotent methods.
    pub retry: Option<RetryConfig>,
}

impl RouteRule {
    /// Compile a route from configuration.
    ///
    /// Returns every problem found in the route, not just the first.
    pub fn from_config(config: &RouteConfig, default_timeout: Duration) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if config.paths.is_empty() {
            errors.push(ValidationError::NoPaths(config.id.clone()));
        }

        let mut patterns = Vec::with_capacity(config.paths.len());
        for raw in &config.paths {
            match PathPattern::parse(raw) {
                Ok(p) => patterns.push(p),
                Err(source) => errors.push(ValidationError::InvalidPattern {
                    route: config.id.clone(),
                    source,
                }),
            }
        }

        let mut methods = Vec::with_capacity(config.methods.len());
        for raw in &config.methods {
            match parse_method(raw) {
                Some(m) => methods.push(m),
                None => errors.push(ValidationError::InvalidMethod {
                    route: config.id.clone(),
                    method: raw.clone(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            id: config.id.clone(),
            patterns,
            methods,
            backend: config.backend.clone(),
            auth_policy: config.auth,
            required_roles: config.required_roles.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout),
            retry: config.retry.clone(),
        })
    }

    /// Build the catch-all rule used when nothing else matches.
    pub fn fallback(config: &FallbackConfig, default_timeout: Duration) -> Self {
        Self {
            id: FALLBACK_ROUTE_ID.to_string(),
            patterns: Vec::new(),
            methods: Vec::new(),
            backend: config.backend.clone(),
            auth_policy: config.auth,
            required_roles: Vec::new(),
            timeout: default_timeout,
            retry: None,
        }
    }

    /// Returns true if both the path and method predicates hold.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.allows_method(method)
            && (self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(path)))
    }

    fn allows_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Returns true if this rule, placed earlier, wins every request `later` could match.
    pub fn shadows(&self, later: &RouteRule) -> bool {
        let methods_covered = self.methods.is_empty()
            || (!later.methods.is_empty() && later.methods.iter().all(|m| self.methods.contains(m)));
        if !methods_covered {
            return false;
        }

        if self.patterns.is_empty() {
            return true;
        }

        !later.patterns.is_empty()
            && later
                .patterns
                .iter()
                .all(|theirs| self.patterns.iter().any(|ours| ours.covers(theirs)))
    }
}

impl AsRef<RouteRule> for RouteRule {
    fn as_ref(&self) -> &RouteRule {
        self
    }
}

/// Parse an HTTP method name. Names are upper-cased first.
pub fn parse_method(raw: &str) -> Option<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }
    Method::from_bytes(upper.as_bytes()).ok()
}

/// Ordered, immutable route table.
///
/// Generic over the stored entry so callers can attach per-route data
/// (such as a filter chain) while matching stays here.
#[derive(Debug)]
pub struct RouteTable<R = RouteRule> {
    routes: Vec<R>,
    fallback: Option<R>,
}

impl<R: AsRef<RouteRule>> RouteTable<R> {
    /// Create a table. `routes` are matched in the given order.
    pub fn new(routes: Vec<R>, fallback: Option<R>) -> Self {
        Self { routes, fallback }
    }

    /// First declared route matching the request, ignoring the fallback.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<&R> {
        self.routes.iter().find(|r| r.as_ref().matches(method, path))
    }

    /// Matching route, or the fallback when one is configured.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&R> {
        self.match_route(method, path).or(self.fallback.as_ref())
    }

    /// All declared routes in match order.
    pub fn routes(&self) -> &[R] {
        &self.routes
    }

    pub fn fallback(&self) -> Option<&R> {
        self.fallback.as_ref()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Pairs of (shadowed route id, id of the earlier route that shadows it).
    pub fn shadowed(&self) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for (i, later) in self.routes.iter().enumerate() {
            let later = later.as_ref();
            if let Some(earlier) = self.routes[..i].iter().map(AsRef::as_ref).find(|e| e.shadows(later)) {
                found.push((later.id.clone(), earlier.id.clone()));
            }
        }
        found
    }
}

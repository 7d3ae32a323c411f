//! Per-route filters and the request context they operate on.
//!
//! # Responsibilities
//! - Hold the per-request state threaded through the filter chain
//! - Apply one filter: authenticate, check roles, or enrich identity headers
//!
//! # Design Decisions
//! - `Filter` is a closed enum; chains are built once at startup
//! - A filter either mutates the context or denies with a `GatewayError`
//! - The context owns the request head and is consumed by the forwarder

use std::sync::Arc;

use axum::http::{header, request::Parts};

use crate::config::schema::AuthPolicy;
use crate::http::error::GatewayError;
use crate::routing::RouteRule;
use crate::security::auth::{self, AuthOutcome};
use crate::security::headers;
use crate::security::token::{Claims, TokenVerifier};

/// State of one request while it passes through its route's filters.
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// Request head; headers are rewritten in place.
    pub parts: Parts,
    /// The rule that matched (or the fallback).
    pub route: &'a RouteRule,
    /// Set only by a successful `Authenticate`.
    pub claims: Option<Claims>,
    pub correlation_id: String,
}

impl<'a> RequestContext<'a> {
    pub fn new(parts: Parts, route: &'a RouteRule, correlation_id: impl Into<String>) -> Self {
        Self {
            parts,
            route,
            claims: None,
            correlation_id: correlation_id.into(),
        }
    }
}

/// One step of a route's filter chain.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Run the authentication decision for the route's policy.
    Authenticate {
        policy: AuthPolicy,
        verifier: Arc<TokenVerifier>,
    },
    /// Deny with `InsufficientRole` unless the caller holds one of these roles.
    RequireRoles(Vec<String>),
    /// Rewrite `X-User-*` from the claims slot.
    EnrichIdentity,
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Authenticate { .. } => "authenticate",
            Filter::RequireRoles(_) => "require_roles",
            Filter::EnrichIdentity => "enrich_identity",
        }
    }

    pub fn apply(&self, ctx: &mut RequestContext<'_>) -> Result<(), GatewayError> {
        match self {
            Filter::Authenticate { policy, verifier } => {
                let authorization = ctx.parts.headers.get(header::AUTHORIZATION);
                match auth::decide(*policy, authorization, verifier) {
                    AuthOutcome::Allowed(claims) => {
                        ctx.claims = claims;
                        Ok(())
                    }
                    AuthOutcome::Denied(kind) => Err(kind.into()),
                }
            }
            Filter::RequireRoles(roles) => auth::authorize_roles(ctx.claims.as_ref(), roles).map_err(Into::into),
            Filter::EnrichIdentity => headers::enrich(&mut ctx.parts.headers, ctx.claims.as_ref()).map_err(|e| {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    "Claims cannot be written as headers"
                );
                GatewayError::TokenMalformed
            }),
        }
    }
}

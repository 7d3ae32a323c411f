//! Error responses produced by the gateway itself.
//!
//! # Responsibilities
//! - Map every gateway-side failure to a status code
//! - Render the `{"error": "..."}` JSON envelope
//!
//! # Design Decisions
//! - Single conversion point: every denial and upstream failure goes through
//!   `IntoResponse for GatewayError`
//! - `WWW-Authenticate` is never emitted, so browsers never open a native
//!   credential dialog
//! - CORS headers are added by the CORS layer on the way out, like any response

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::security::auth::AuthErrorKind;

/// Failures answered at the gateway; never proxied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Missing or malformed Authorization header")]
    MissingOrMalformedHeader,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Malformed token")]
    TokenMalformed,

    #[error("Unsupported token")]
    UnsupportedToken,

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("No route found")]
    NoRouteMatch,

    #[error("Invalid request path")]
    InvalidPath,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Could not read request body")]
    RequestBody,

    #[error("Upstream service unavailable")]
    UpstreamUnreachable,

    #[error("Upstream timed out")]
    UpstreamTimeout,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingOrMalformedHeader
            | GatewayError::TokenExpired
            | GatewayError::SignatureInvalid
            | GatewayError::TokenMalformed
            | GatewayError::UnsupportedToken => StatusCode::UNAUTHORIZED,
            GatewayError::InsufficientRole => StatusCode::FORBIDDEN,
            GatewayError::NoRouteMatch => StatusCode::NOT_FOUND,
            GatewayError::InvalidPath => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestBody => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingOrMalformedHeader => "missing_or_malformed_header",
            GatewayError::TokenExpired => "token_expired",
            GatewayError::SignatureInvalid => "signature_invalid",
            GatewayError::TokenMalformed => "token_malformed",
            GatewayError::UnsupportedToken => "unsupported_token",
            GatewayError::InsufficientRole => "insufficient_role",
            GatewayError::NoRouteMatch => "no_route_match",
            GatewayError::InvalidPath => "invalid_path",
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::PayloadTooLarge => "payload_too_large",
            GatewayError::RequestBody => "request_body",
            GatewayError::UpstreamUnreachable => "upstream_unreachable",
            GatewayError::UpstreamTimeout => "upstream_timeout",
        }
    }
}

impl From<AuthErrorKind> for GatewayError {
    fn from(kind: AuthErrorKind) -> Self {
        match kind {
            AuthErrorKind::MissingOrMalformedHeader => GatewayError::MissingOrMalformedHeader,
            AuthErrorKind::TokenExpired => GatewayError::TokenExpired,
            AuthErrorKind::SignatureInvalid => GatewayError::SignatureInvalid,
            AuthErrorKind::TokenMalformed => GatewayError::TokenMalformed,
            AuthErrorKind::UnsupportedToken => GatewayError::UnsupportedToken,
            AuthErrorKind::InsufficientRole => GatewayError::InsufficientRole,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

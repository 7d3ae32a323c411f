//! Authentication decision.
//!
//! # State Machine
//! ```text
//! START (CORS preflight already answered upstream of this point)
//!   → POLICY_LOOKUP   none      → ALLOW(no claims)
//!   → TOKEN_EXTRACT   no bearer → required: DENY(MissingOrMalformedHeader)
//!                                 optional: ALLOW(no claims)
//!   → TOKEN_VERIFY    ok        → ALLOW(claims)
//!                     failure   → required: DENY(kind)
//!                                 optional: ALLOW(no claims)
//! ```
//!
//! # Design Decisions
//! - Pure function of (policy, Authorization header, verifier); no I/O
//! - Never retried; resolved inside the request that triggered it
//! - An invalid token on an optional route contributes nothing downstream

use axum::http::HeaderValue;

use crate::config::schema::AuthPolicy;
use crate::security::token::{Claims, TokenError, TokenVerifier};

/// Authorization scheme prefix, matched case-sensitively.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Reasons a request is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    MissingOrMalformedHeader,
    TokenExpired,
    SignatureInvalid,
    TokenMalformed,
    UnsupportedToken,
    InsufficientRole,
}

impl AuthErrorKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingOrMalformedHeader => "missing_or_malformed_header",
            AuthErrorKind::TokenExpired => "token_expired",
            AuthErrorKind::SignatureInvalid => "signature_invalid",
            AuthErrorKind::TokenMalformed => "token_malformed",
            AuthErrorKind::UnsupportedToken => "unsupported_token",
            AuthErrorKind::InsufficientRole => "insufficient_role",
        }
    }
}

impl From<TokenError> for AuthErrorKind {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthErrorKind::TokenExpired,
            TokenError::SignatureInvalid => AuthErrorKind::SignatureInvalid,
            TokenError::Malformed => AuthErrorKind::TokenMalformed,
            TokenError::Unsupported => AuthErrorKind::UnsupportedToken,
        }
    }
}

/// Result of the authentication decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Forward; claims are present only when a token verified.
    Allowed(Option<Claims>),
    Denied(AuthErrorKind),
}

/// Extract the token from a `Bearer` Authorization header.
///
/// Returns `None` for a missing header, a non-ASCII value, another scheme,
/// or an empty token.
pub fn bearer_token(header: Option<&HeaderValue>) -> Option<&str> {
    let value = header?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Decide whether a request may proceed under `policy`.
pub fn decide(policy: AuthPolicy, authorization: Option<&HeaderValue>, verifier: &TokenVerifier) -> AuthOutcome {
    if policy == AuthPolicy::None {
        return AuthOutcome::Allowed(None);
    }

    let token = match bearer_token(authorization) {
        Some(token) => token,
        None => {
            return match policy {
                AuthPolicy::Required => AuthOutcome::Denied(AuthErrorKind::MissingOrMalformedHeader),
                _ => AuthOutcome::Allowed(None),
            };
        }
    };

    match verifier.verify(token) {
        Ok(claims) => AuthOutcome::Allowed(Some(claims)),
        Err(err) => {
            tracing::debug!(error = %err, policy = %policy, "Token rejected");
            match policy {
                AuthPolicy::Required => AuthOutcome::Denied(err.into()),
                _ => AuthOutcome::Allowed(None),
            }
        }
    }
}

/// Check that the caller holds at least one of `required` roles.
///
/// An empty requirement always passes.
pub fn authorize_roles(claims: Option<&Claims>, required: &[String]) -> Result<(), AuthErrorKind> {
    if required.is_empty() {
        return Ok(());
    }
    match claims {
        Some(c) if c.roles.iter().any(|r| required.contains(r)) => Ok(()),
        _ => Err(AuthErrorKind::InsufficientRole),
    }
}

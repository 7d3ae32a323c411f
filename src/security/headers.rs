//! Trusted identity headers.
//!
//! # Responsibilities
//! - Remove every client-supplied `X-User-*` header
//! - Write `X-User-Id`, `X-User-Email`, `X-User-Roles` from verified claims
//!
//! # Design Decisions
//! - Overwrite, never merge: backends treat these headers as authoritative
//! - Anonymous requests leave with no `X-User-*` header at all
//! - `Authorization` is left untouched so backends may re-verify

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderName, HeaderValue};

use crate::security::token::Claims;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");

/// Prefix of every identity header reserved for the gateway.
const IDENTITY_PREFIX: &str = "x-user-";

/// Rewrite identity headers for the outgoing request.
///
/// Fails only if a claim holds characters that cannot appear in a header;
/// the stale headers are already gone in that case.
pub fn enrich(headers: &mut HeaderMap, claims: Option<&Claims>) -> Result<(), InvalidHeaderValue> {
    let stale: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IDENTITY_PREFIX))
        .cloned()
        .collect();
    for name in stale {
        headers.remove(&name);
    }

    let Some(claims) = claims else {
        return Ok(());
    };

    let email = HeaderValue::from_str(&claims.subject)?;
    let roles = HeaderValue::from_str(&claims.roles.join(","))?;
    let user_id = claims.user_id.as_deref().map(HeaderValue::from_str).transpose()?;

    headers.insert(X_USER_EMAIL, email);
    headers.insert(X_USER_ROLES, roles);
    if let Some(id) = user_id {
        headers.insert(X_USER_ID, id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn claims() -> Claims {
        Claims {
            subject: "dave@example.com".to_string(),
            user_id: Some("42".to_string()),
            roles: vec!["CUSTOMER".to_string(), "ADMIN".to_string()],
            issued_at: Some(1),
            expires_at: 2,
        }
    }

    fn spoofed() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(X_USER_ID, HeaderValue::from_static("1"));
        headers.append(X_USER_ID, HeaderValue::from_static("2"));
        headers.insert(X_USER_ROLES, HeaderValue::from_static("ADMIN"));
        headers.insert("x-user-tenant", HeaderValue::from_static("other"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers
    }

    #[test]
    fn test_claims_overwrite_client_values() {
        let mut headers = spoofed();
        enrich(&mut headers, Some(&claims())).unwrap();

        assert_eq!(headers.get_all(X_USER_ID).iter().count(), 1);
        assert_eq!(headers[X_USER_ID], "42");
        assert_eq!(headers[X_USER_EMAIL], "dave@example.com");
        assert_eq!(headers[X_USER_ROLES], "CUSTOMER,ADMIN");
        assert!(headers.get("x-user-tenant").is_none());
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_anonymous_strips_identity_headers() {
        let mut headers = spoofed();
        enrich(&mut headers, None).unwrap();

        assert!(headers.keys().all(|k| !k.as_str().starts_with("x-user-")));
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let mut once = spoofed();
        enrich(&mut once, Some(&claims())).unwrap();
        let mut twice = once.clone();
        enrich(&mut twice, Some(&claims())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_user_id_and_roles() {
        let mut headers = spoofed();
        let refresh = Claims {
            user_id: None,
            roles: Vec::new(),
            ..claims()
        };
        enrich(&mut headers, Some(&refresh)).unwrap();
        assert!(headers.get(X_USER_ID).is_none());
        assert_eq!(headers[X_USER_ROLES], "");
        assert_eq!(headers[X_USER_EMAIL], "dave@example.com");
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let mut headers = spoofed();
        let bad = Claims {
            subject: "evil\r\nX-User-Id: 1".to_string(),
            ..claims()
        };
        assert!(enrich(&mut headers, Some(&bad)).is_err());
        assert!(headers.get(X_USER_ID).is_none());
    }
}

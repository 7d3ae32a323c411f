//! JWT verification (and development issuance).
//!
//! # Responsibilities
//! - Verify compact HS256 tokens against the shared secret
//! - Classify failures: expired, bad signature, malformed, unsupported
//! - Extract identity claims (`sub`, `userId`, `roles`)
//!
//! # Design Decisions
//! - Stateless and pure CPU; safe to call from any task without locking
//! - Zero leeway on `exp`: a token past its expiry is `Expired`, never folded
//!   into another failure kind
//! - The header is inspected before `jsonwebtoken` runs so `alg: none` and
//!   foreign algorithms report `Unsupported` rather than a parse error

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token signature does not verify")]
    SignatureInvalid,

    #[error("token is not a well-formed JWT")]
    Malformed,

    #[error("token uses an unsupported algorithm or extension")]
    Unsupported,
}

/// Verified identity carried by a token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    /// User email (`sub`).
    pub subject: String,
    /// Numeric or textual user id, absent on refresh tokens.
    pub user_id: Option<String>,
    /// Roles in token order.
    pub roles: Vec<String>,
    pub issued_at: Option<u64>,
    pub expires_at: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserIdClaim {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(rename = "userId", default)]
    user_id: Option<UserIdClaim>,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    iat: Option<u64>,
    exp: u64,
}

impl From<TokenClaims> for Claims {
    fn from(raw: TokenClaims) -> Self {
        Self {
            subject: raw.sub,
            user_id: raw.user_id.map(|id| match id {
                UserIdClaim::Text(s) => s,
                UserIdClaim::Number(n) => n.to_string(),
            }),
            roles: raw.roles.unwrap_or_default(),
            issued_at: raw.iat,
            expires_at: raw.exp,
        }
    }
}

/// Verifies tokens signed with the gateway's shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").field("algorithm", &"HS256").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier keyed by the UTF-8 bytes of `secret`.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a compact token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        check_header(token)?;

        let data = decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|e| classify(e.kind()))?;
        Ok(data.claims.into())
    }
}

/// Structural and algorithm checks on the JOSE header.
fn check_header(token: &str) -> Result<(), TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(TokenError::Malformed);
    }

    let header_json = URL_SAFE_NO_PAD.decode(parts[0]).map_err(|_| TokenError::Malformed)?;
    let header: serde_json::Value = serde_json::from_slice(&header_json).map_err(|_| TokenError::Malformed)?;
    let obj = header.as_object().ok_or(TokenError::Malformed)?;

    if obj.contains_key("crit") {
        return Err(TokenError::Unsupported);
    }

    match obj.get("alg").and_then(|v| v.as_str()) {
        Some("HS256") => Ok(()),
        Some(_) => Err(TokenError::Unsupported),
        None => Err(TokenError::Malformed),
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::InvalidKeyFormat => {
            TokenError::Unsupported
        }
        _ => TokenError::Malformed,
    }
}

/// Kind of token minted by [`TokenIssuer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    /// Carries no `userId` or `roles`, like the user service's refresh tokens.
    Refresh,
}

#[derive(Debug, Serialize)]
struct IssuedClaims<'a> {
    sub: &'a str,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roles: Option<&'a [String]>,
    iat: u64,
    exp: u64,
}

/// Mints tokens in the format the user service issues.
///
/// Development tooling only; production tokens come from the user service.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Mint a token issued now.
    pub fn issue(
        &self,
        kind: TokenKind,
        subject: &str,
        user_id: Option<&str>,
        roles: &[String],
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = jsonwebtoken::get_current_timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        self.issue_at(kind, subject, user_id, roles, now, now.saturating_add(ttl))
    }

    /// Mint a token with explicit `iat`/`exp`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject: &str,
        user_id: Option<&str>,
        roles: &[String],
        iat: u64,
        exp: u64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = match kind {
            TokenKind::Access => IssuedClaims {
                sub: subject,
                user_id,
                email: Some(subject),
                roles: Some(roles),
                iat,
                exp,
            },
            TokenKind::Refresh => IssuedClaims {
                sub: subject,
                user_id: None,
                email: None,
                roles: None,
                iat,
                exp,
            },
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-test-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, 3600, 7200)
    }

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Hand-assembled token; the signature is never reached for these headers.
    fn encode_raw(header: serde_json::Value, claims: serde_json::Value) -> String {
        let h = URL_SAFE_NO_PAD.encode(header.to_string());
        let c = URL_SAFE_NO_PAD.encode(claims.to_string());
        let sig = URL_SAFE_NO_PAD.encode("signature");
        format!("{h}.{c}.{sig}")
    }

    #[test]
    fn test_valid_token_yields_claims() {
        let token = issuer()
            .issue(TokenKind::Access, "alice@example.com", Some("42"), &roles(&["CUSTOMER", "ADMIN"]))
            .unwrap();
        let claims = TokenVerifier::new(SECRET).verify(&token).unwrap();

        assert_eq!(claims.subject, "alice@example.com");
        assert_eq!(claims.user_id.as_deref(), Some("42"));
        assert_eq!(claims.roles, roles(&["CUSTOMER", "ADMIN"]));
        assert!(claims.expires_at > claims.issued_at.unwrap());
    }

    #[test]
    fn test_numeric_user_id_and_missing_roles() {
        let now = jsonwebtoken::get_current_timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "bob@example.com", "userId": 7, "exp": now + 60 }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let claims = TokenVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.user_id.as_deref(), Some("7"));
        assert!(claims.roles.is_empty());
        assert_eq!(claims.issued_at, None);
    }

    #[test]
    fn test_refresh_token_has_no_identity_extras() {
        let token = issuer().issue(TokenKind::Refresh, "bob@example.com", Some("9"), &[]).unwrap();
        let claims = TokenVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.user_id, None);
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_expired_token() {
        let now = jsonwebtoken::get_current_timestamp();
        let token = issuer()
            .issue_at(TokenKind::Access, "a@b.c", Some("1"), &[], now - 120, now - 1)
            .unwrap();
        assert_eq!(TokenVerifier::new(SECRET).verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let token = TokenIssuer::new("another-secret-another-secret-xxxx", 60, 60)
            .issue(TokenKind::Access, "a@b.c", Some("1"), &[])
            .unwrap();
        assert_eq!(TokenVerifier::new(SECRET).verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let now = jsonwebtoken::get_current_timestamp();
        let token = TokenIssuer::new("another-secret-another-secret-xxxx", 60, 60)
            .issue_at(TokenKind::Access, "a@b.c", Some("1"), &[], now - 120, now - 60)
            .unwrap();
        assert_eq!(TokenVerifier::new(SECRET).verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_tampered_payload_is_signature_invalid() {
        let token = issuer().issue(TokenKind::Access, "a@b.c", Some("1"), &roles(&["CUSTOMER"])).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let now = jsonwebtoken::get_current_timestamp();
        parts[1] = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "sub": "a@b.c", "userId": "1", "roles": ["ADMIN"], "exp": now + 60 }).to_string(),
        );
        let forged = parts.join(".");
        assert_eq!(TokenVerifier::new(SECRET).verify(&forged), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(""), Err(TokenError::Malformed));
        assert_eq!(verifier.verify("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(verifier.verify("a.b"), Err(TokenError::Malformed));
        assert_eq!(verifier.verify("a..c"), Err(TokenError::Malformed));
        assert_eq!(verifier.verify("!!!.???.###"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_claim_shape_is_malformed() {
        let now = jsonwebtoken::get_current_timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "a@b.c", "roles": "ADMIN", "exp": now + 60 }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(TokenVerifier::new(SECRET).verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "a@b.c" }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(TokenVerifier::new(SECRET).verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unsupported_algorithms() {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = serde_json::json!({ "sub": "a@b.c", "exp": now + 60 });
        let verifier = TokenVerifier::new(SECRET);

        let none = encode_raw(serde_json::json!({ "alg": "none", "typ": "JWT" }), claims.clone());
        assert_eq!(verifier.verify(&none), Err(TokenError::Unsupported));

        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(verifier.verify(&hs512), Err(TokenError::Unsupported));

        let crit = encode_raw(serde_json::json!({ "alg": "HS256", "crit": ["exp"] }), claims);
        assert_eq!(verifier.verify(&crit), Err(TokenError::Unsupported));
    }
}

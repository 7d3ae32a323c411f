//! CORS preflight handling and response decoration.
//!
//! # Responsibilities
//! - Answer every `OPTIONS` request before routing or authentication run
//! - Decide whether the request `Origin` is allow-listed
//! - Attach CORS headers to every outgoing response, errors included
//!
//! # Design Decisions
//! - The only place CORS headers are produced; upstream `Access-Control-*`
//!   headers are replaced
//! - Preflights from unknown origins still get `200`, just without CORS
//!   headers, so the browser's own check fails the real request
//! - `scheme://host:*` patterns match any numeric port, or none

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::schema::CorsConfig;
use crate::config::validation::ValidationError;

/// An origin allowed on any port: `scheme://host:*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPattern {
    /// `scheme://host`
    prefix: String,
}

impl OriginPattern {
    /// Parse a `scheme://host:*` pattern.
    pub fn parse(raw: &str) -> Option<Self> {
        let prefix = raw.strip_suffix(":*")?;
        let (scheme, host) = prefix.split_once("://")?;
        if scheme.is_empty() || host.is_empty() || host.contains(['/', ':', '*']) {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn matches(&self, origin: &str) -> bool {
        match origin.strip_prefix(self.prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix(':')
                .map(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Compiled CORS policy, shared read-only across requests.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    exact: Vec<String>,
    patterns: Vec<OriginPattern>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

fn join_header(field: &'static str, values: &[String]) -> Result<HeaderValue, ValidationError> {
    let joined = values.join(", ");
    HeaderValue::from_str(&joined).map_err(|_| ValidationError::InvalidCorsHeader { field, value: joined })
}

impl CorsPolicy {
    /// Compile the policy from configuration, reporting every problem.
    pub fn from_config(config: &CorsConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        for origin in &config.allowed_origins {
            if origin.contains('*') || !origin.contains("://") || origin.ends_with('/') {
                errors.push(ValidationError::InvalidOrigin(origin.clone()));
            }
        }

        let mut patterns = Vec::with_capacity(config.allowed_origin_patterns.len());
        for raw in &config.allowed_origin_patterns {
            match OriginPattern::parse(raw) {
                Some(p) => patterns.push(p),
                None => errors.push(ValidationError::InvalidOriginPattern(raw.clone())),
            }
        }

        let allow_methods = join_header("allowed_methods", &config.allowed_methods);
        let allow_headers = join_header("allowed_headers", &config.allowed_headers);
        let expose_headers = if config.exposed_headers.is_empty() {
            Ok(None)
        } else {
            join_header("exposed_headers", &config.exposed_headers).map(Some)
        };

        match (allow_methods, allow_headers, expose_headers) {
            (Ok(allow_methods), Ok(allow_headers), Ok(expose_headers)) if errors.is_empty() => Ok(Self {
                exact: config.allowed_origins.clone(),
                patterns,
                allow_methods,
                allow_headers,
                expose_headers,
                max_age: HeaderValue::from(config.max_age_secs),
            }),
            (m, h, e) => {
                errors.extend(m.err());
                errors.extend(h.err());
                errors.extend(e.err());
                Err(errors)
            }
        }
    }

    /// Returns true if `origin` is allow-listed.
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.exact.iter().any(|o| o == origin) || self.patterns.iter().any(|p| p.matches(origin))
    }

    /// The request's `Origin` header, if present and allow-listed.
    pub fn allowed_origin<'a>(&self, headers: &'a HeaderMap) -> Option<&'a HeaderValue> {
        let value = headers.get(header::ORIGIN)?;
        let origin = value.to_str().ok()?;
        self.is_allowed(origin).then_some(value)
    }

    /// Answer a preflight. Always `200`; CORS headers only for allowed origins.
    pub fn preflight(&self, origin: Option<&HeaderValue>) -> Response {
        let mut response = StatusCode::OK.into_response();
        if let Some(origin) = origin {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
        response
    }

    /// Replace any CORS headers on an actual response with this policy's answer.
    pub fn decorate(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        let upstream: Vec<_> = headers
            .keys()
            .filter(|name| name.as_str().starts_with("access-control-"))
            .cloned()
            .collect();
        for name in upstream {
            headers.remove(&name);
        }

        if let Some(origin) = origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            if let Some(expose) = &self.expose_headers {
                headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
            }
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
    }
}

/// First layer of the pipeline. Short-circuits `OPTIONS`.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = policy.allowed_origin(request.headers()).cloned();

    if request.method() == Method::OPTIONS {
        tracing::debug!(
            path = %request.uri().path(),
            origin_allowed = origin.is_some(),
            "Answering preflight"
        );
        return policy.preflight(origin.as_ref());
    }

    let mut response = next.run(request).await;
    policy.decorate(origin.as_ref(), response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["http://localhost:5173".into(), "http://127.0.0.1:5173".into()],
            allowed_origin_patterns: vec!["http://localhost:*".into()],
            ..CorsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_origin_pattern() {
        let p = OriginPattern::parse("http://localhost:*").unwrap();
        assert!(p.matches("http://localhost:3000"));
        assert!(p.matches("http://localhost"));
        assert!(!p.matches("http://localhost:"));
        assert!(!p.matches("http://localhost:30a0"));
        assert!(!p.matches("http://localhost.evil.com"));
        assert!(!p.matches("https://localhost:3000"));

        assert!(OriginPattern::parse("http://localhost").is_none());
        assert!(OriginPattern::parse("localhost:*").is_none());
        assert!(OriginPattern::parse("http://*.example.com:*").is_none());
    }

    #[test]
    fn test_allow_list() {
        let p = policy();
        assert!(p.is_allowed("http://localhost:5173"));
        assert!(p.is_allowed("http://127.0.0.1:5173"));
        assert!(p.is_allowed("http://localhost:8080"));
        assert!(!p.is_allowed("http://127.0.0.1:3000"));
        assert!(!p.is_allowed("https://evil.example"));
    }

    #[test]
    fn test_preflight_headers_for_allowed_origin() {
        let origin = HeaderValue::from_static("http://localhost:5173");
        let response = policy().preflight(Some(&origin));
        assert_eq!(response.status(), StatusCode::OK);
        let h = response.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(h[header::ACCESS_CONTROL_MAX_AGE], "3600");
        assert!(h[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap().contains("PATCH"));
        assert!(h[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap().contains("Authorization"));
    }

    #[test]
    fn test_preflight_without_origin_has_no_cors_headers() {
        let response = policy().preflight(None);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .keys()
            .all(|k| !k.as_str().starts_with("access-control-")));
    }

    #[test]
    fn test_decorate_replaces_upstream_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        policy().decorate(None, &mut headers);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(headers.get(header::CONTENT_TYPE).is_some());

        let origin = HeaderValue::from_static("http://localhost:5173");
        policy().decorate(Some(&origin), &mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .contains("X-User-Id"));
    }

    #[test]
    fn test_invalid_config_reports_all_errors() {
        let errors = CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["*".into(), "http://ok.example".into()],
            allowed_origin_patterns: vec!["http://host".into()],
            allowed_headers: vec!["Bad\nHeader".into()],
            ..CorsConfig::default()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}

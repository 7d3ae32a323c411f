//! Backend registry: backend name → base URL.
//!
//! # Responsibilities
//! - Parse and check backend base URLs once at startup
//! - Resolve a route's backend name to its base URL
//! - Join a base URL with the request's path and query
//!
//! # Design Decisions
//! - Only plain `http` backends; TLS terminates at the gateway
//! - A base path is kept as a prefix (`http://h/shop` + `/api/x` → `http://h/shop/api/x`)

use std::collections::HashMap;

use axum::http::{uri::InvalidUri, Uri};
use url::{Position, Url};

use crate::config::schema::BackendConfig;
use crate::config::validation::ValidationError;

#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Url>,
}

impl BackendRegistry {
    /// Build the registry, reporting every bad or duplicate entry.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, Vec<ValidationError>> {
        let mut backends = HashMap::with_capacity(configs.len());
        let mut errors = Vec::new();

        for config in configs {
            match parse_base_url(&config.url) {
                Ok(url) => {
                    if backends.insert(config.name.clone(), url).is_some() {
                        errors.push(ValidationError::DuplicateBackend(config.name.clone()));
                    }
                }
                Err(reason) => errors.push(ValidationError::InvalidBackendUrl {
                    backend: config.name.clone(),
                    reason,
                }),
            }
        }

        if errors.is_empty() {
            Ok(Self { backends })
        } else {
            Err(errors)
        }
    }

    pub fn get(&self, name: &str) -> Option<&Url> {
        self.backends.get(name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("scheme '{}' is not supported, use http", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(url)
}

/// Target URI for a request forwarded to `base`.
pub fn upstream_uri(base: &Url, path_and_query: &str) -> Result<Uri, InvalidUri> {
    let authority = &base[Position::BeforeHost..Position::AfterPort];
    let prefix = base.path().trim_end_matches('/');
    format!("http://{authority}{prefix}{path_and_query}").parse()
}

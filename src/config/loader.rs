//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `jwt.secret` when set and non-empty.
pub const SECRET_ENV_VAR: &str = "GATEWAY_JWT_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// Parse and validate configuration from TOML text.
///
/// `secret_override` replaces `jwt.secret` before validation.
pub fn parse_config(content: &str, secret_override: Option<String>) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;

    if let Some(secret) = secret_override.filter(|s| !s.is_empty()) {
        config.jwt.secret = secret;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content, std::env::var(SECRET_ENV_VAR).ok())?;

    tracing::debug!(
        path = %path.display(),
        routes = config.routes.len(),
        backends = config.backends.len(),
        "Configuration file loaded"
    );

    Ok(config)
}

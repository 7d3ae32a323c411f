//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & deserialize, GATEWAY_JWT_SECRET override)
//!     → validation.rs (semantic checks, all errors reported at once)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into the pipeline, CORS policy and backend registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthPolicy, BackendConfig, CorsConfig, FallbackConfig, GatewayConfig, JwtConfig, ListenerConfig,
    RetryConfig, RouteConfig,
};
pub use validation::{validate_config, ValidationError};

//! E-commerce API gateway library.
//!
//! Every external request passes through one pipeline: CORS preflight,
//! route resolution, authentication, identity header enrichment, and the
//! upstream call. See `main.rs` for the component diagram.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → limit.rs (in-flight cap)
//!     → request.rs (correlation id)
//!     → [CORS, pipeline, upstream forwarder]
//!     → error.rs (gateway-side failures as JSON)
//!     → Send to client
//! ```

pub mod error;
pub mod limit;
pub mod request;
pub mod server;

pub use error::GatewayError;
pub use request::X_CORRELATION_ID;
pub use server::{HttpServer, HEALTH_PATH};

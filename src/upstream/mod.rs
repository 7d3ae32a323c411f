//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted RequestContext + body
//!     → registry.rs (backend name → base URL)
//!     → forward.rs (rewrite head, call with deadline, optional retries)
//!     → sanitized upstream response, or UpstreamTimeout / UpstreamUnreachable
//! ```
//!
//! # Design Decisions
//! - One pooled hyper client shared by all routes
//! - Backends resolved by name; discovery is outside the gateway

pub mod forward;
pub mod registry;

pub use forward::Forwarder;
pub use registry::BackendRegistry;

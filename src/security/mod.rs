//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (answer OPTIONS, remember allowed origin)
//!     → [route resolved]
//!     → auth.rs (policy + bearer token → allow/deny)
//!         → token.rs (signature, expiry, claims)
//!     → headers.rs (rewrite X-User-* from claims)
//!     → Pass to upstream forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed on required routes: any token problem denies
//! - No trust in client input: identity headers are always rewritten
//! - CORS decided once, before everything else

pub mod auth;
pub mod cors;
pub mod headers;
pub mod token;

pub use auth::{AuthErrorKind, AuthOutcome};
pub use cors::CorsPolicy;
pub use token::{Claims, TokenError, TokenVerifier};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → table.rs (ordered scan, first match wins)
//!     → pattern.rs (evaluate path patterns)
//!     → Return: matched rule, fallback rule, or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse patterns and methods
//!     → Reject rules shadowed by an earlier rule
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route
//! - First match wins, in declaration order

pub mod pattern;
pub mod table;

pub use pattern::{has_unsafe_segment, PathPattern, PatternError};
pub use table::{RouteRule, RouteTable, FALLBACK_ROUTE_ID};

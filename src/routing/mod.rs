//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup)
//!     → matcher.rs (segment-boundary prefix check)
//!     → rewrite.rs (prefix replacement)
//!     → Return: Resolution or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Build one BackendTarget per route
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod rewrite;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use rewrite::PathRewrite;
pub use router::{Resolution, RouteEntry, RouteTable};

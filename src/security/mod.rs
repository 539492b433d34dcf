//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_key.rs (derive the rate-limit bucket)
//!     → rate_limit.rs (fixed-window check per client)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to upstream
//! ```
//!
//! # Design Decisions
//! - Rejected requests never reach a backend
//! - No trust in client input: forwarding headers are appended, not replaced

pub mod client_key;
pub mod headers;
pub mod rate_limit;

pub use client_key::{ClientKey, ClientKeyStrategy};
pub use rate_limit::{RateDecision, RateLimiter};

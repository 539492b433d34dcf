//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Startup complete (server.rs)
//!     → state.rs (readiness flag set)
//!
//! Operational request:
//!     → probe.rs (liveness, readiness, metrics)
//!     → Answered locally, never rate limited or proxied
//! ```

pub mod probe;
pub mod state;

pub use probe::{HealthProbe, ProbeKind};
pub use state::ReadinessState;

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline finalization produces:
//!     → logging.rs (one structured access event per request)
//!     → metrics.rs (duration histogram, rejection and error counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::MetricsRecorder;

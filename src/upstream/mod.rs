//! Upstream subsystem: backend targets and request forwarding.
//!
//! # Data Flow
//! ```text
//! Resolution (route, rewritten path)
//!     → dispatcher.rs (slot, headers, single attempt under timeout)
//!     → target.rs (per-backend client and semaphore)
//!     → Return: BackendResponse or ProxyError (error.rs)
//! ```

pub mod dispatcher;
pub mod error;
pub mod target;

pub use dispatcher::{BackendResponse, OutboundRequest, ProxyDispatcher};
pub use error::{ProxyError, ProxyErrorKind};
pub use target::{BackendTarget, TargetError, TargetSlot};

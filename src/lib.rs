//! Edge API gateway library.

// Core subsystems
pub mod config;
pub mod http;
pub mod pipeline;
pub mod routing;
pub mod upstream;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, StartupError};
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;

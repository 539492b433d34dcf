//! Edge API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   API GATEWAY                    │
//!                         │                                                  │
//!     Client Request      │  ┌─────────┐   ┌────────────┐   ┌───────────┐    │
//!     ────────────────────┼─▶│  http   │──▶│ rate limit │──▶│  routing  │    │
//!                         │  │ server  │   │ (security) │   │   table   │    │
//!                         │  └─────────┘   └────────────┘   └─────┬─────┘    │
//!                         │                                       │          │
//!                         │                                       ▼          │
//!     Client Response     │  ┌──────────┐                  ┌────────────┐    │
//!     ◀───────────────────┼──│ finalize │◀─────────────────│  upstream  │◀───┼── Backend
//!                         │  │ (metrics)│                  │ dispatcher │    │   Service
//!                         │  └──────────┘                  └────────────┘    │
//!                         │                                                  │
//!                         │   config · health · observability · lifecycle    │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::config::{load_config, ConfigError, GatewayConfig};
use api_gateway::observability::logging;
use api_gateway::{GatewayServer, Shutdown, StartupError};

#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about = "Edge API gateway")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding config and PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            // logging is not configured yet
            eprintln!("api-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("api-gateway: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        routes = config.routes.len(),
        request_timeout_ms = config.timeouts.request_ms,
        "api-gateway starting"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

fn load(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = load_config(args.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(port) = args.port {
        config.listener.port = port;
    }
    Ok(config)
}

async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let server = GatewayServer::new(config)?;
    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let signals = shutdown.trigger_on_signal();

    let result = server.run(listener, receiver).await;
    signals.abort();
    result
}

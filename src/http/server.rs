//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every subsystem from configuration and inject it into the pipeline
//! - Create the Axum Router with the catch-all handler
//! - Wire up middleware (request ID, tracing, inbound concurrency cap)
//! - Bind to a listener and serve until shutdown
//! - Sweep idle rate-limit windows in the background

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validation, ConfigError, GatewayConfig};
use crate::health::HealthProbe;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::observability::MetricsRecorder;
use crate::pipeline::Pipeline;
use crate::routing::RouteTable;
use crate::security::{ClientKeyStrategy, RateLimiter};
use crate::upstream::{ProxyDispatcher, TargetError};

/// Fatal error before the gateway starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend target: {0}")]
    Target(#[from] TargetError),
    #[error("metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("client key header: {0}")]
    ClientKey(#[from] axum::http::header::InvalidHeaderName),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    config: GatewayConfig,
    pipeline: Arc<Pipeline>,
}

impl GatewayServer {
    /// Build all subsystems. Nothing is bound yet.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        validation::validate_config(&config).map_err(ConfigError::Validation)?;

        let routes = RouteTable::from_config(&config.routes, &config.timeouts)?;
        let limiter = RateLimiter::from_config(&config.rate_limit);
        let metrics = MetricsRecorder::new(&config.observability.duration_buckets_ms)?;
        let probe = HealthProbe::from_config(&config.observability);
        let dispatcher = ProxyDispatcher::new(Duration::from_millis(config.timeouts.request_ms));
        let client_keys = ClientKeyStrategy::from_config(&config.rate_limit.client_key)?;

        for entry in routes.entries() {
            tracing::info!(
                route = %entry.name,
                prefix = %entry.prefix(),
                backend = %entry.target().base_url(),
                "Route registered"
            );
        }

        let pipeline = Pipeline::new(
            Arc::new(limiter),
            Arc::new(routes),
            dispatcher,
            Arc::new(metrics),
            Arc::new(probe),
        )
        .with_client_keys(client_keys)
        .with_mode(config.mode);

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(self.pipeline.clone())
            .layer(GlobalConcurrencyLimitLayer::new(self.config.listener.max_connections))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = self.config.listener.bind_address();
        TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
        let addr = listener.local_addr().map_err(StartupError::Serve)?;

        let sweeper = spawn_sweeper(self.pipeline.limiter().clone());
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        self.pipeline.probe().mark_ready();
        tracing::info!(address = %addr, mode = ?self.config.mode, "HTTP server starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        if let Some(handle) = sweeper {
            handle.abort();
        }
        result.map_err(StartupError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: everything goes through the pipeline.
async fn gateway_handler(
    State(pipeline): State<Arc<Pipeline>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    pipeline.handle(peer, request).await
}

/// Evict expired windows once per window length.
fn spawn_sweeper(limiter: Arc<RateLimiter>) -> Option<tokio::task::JoinHandle<()>> {
    if !limiter.is_enabled() {
        return None;
    }
    let period = limiter.window();
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep(Instant::now());
            tracing::debug!(removed, tracked = limiter.tracked_clients(), "Swept rate windows");
        }
    }))
}

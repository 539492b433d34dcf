//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file (or no file at all) yields the
//! stock three-service gateway. Environment overrides are applied on top by
//! `loader.rs`.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind host, port, inbound concurrency).
    pub listener: ListenerConfig,

    /// Route definitions mapping path prefixes to backend targets.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration for outbound calls.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Whether error bodies may carry internal detail.
    pub mode: DeploymentMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: RouteConfig::defaults(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
            mode: DeploymentMode::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to bind.
    pub port: u16,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
        }
    }
}

/// A single path-prefix route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path prefix to match (e.g., "/api/auth").
    pub prefix: String,

    /// Backend base URL (e.g., "http://auth-service:8080").
    pub target: String,

    /// Replacement for the matched prefix. `None` forwards the path unchanged.
    #[serde(default)]
    pub rewrite_to: Option<String>,

    /// Environment variable that overrides `target` when set.
    #[serde(default)]
    pub target_env: Option<String>,

    /// Maximum concurrent outbound requests to this backend.
    #[serde(default = "default_max_backend_conns")]
    pub max_connections: usize,
}

fn default_max_backend_conns() -> usize {
    100
}

impl RouteConfig {
    fn service(name: &str, prefix: &str, target: &str, rewrite_to: &str, target_env: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            target: target.to_string(),
            rewrite_to: Some(rewrite_to.to_string()),
            target_env: Some(target_env.to_string()),
            max_connections: default_max_backend_conns(),
        }
    }

    /// The stock route table: auth, users and products services.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::service("auth", "/api/auth", "http://auth-service:8080", "/auth", "AUTH_SERVICE_URL"),
            Self::service("users", "/api/users", "http://user-service:8080", "/users", "USER_SERVICE_URL"),
            Self::service(
                "products",
                "/api/products",
                "http://product-service:8080",
                "/products",
                "PRODUCT_SERVICE_URL",
            ),
        ]
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Deadline for receiving the backend response head, in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            request_ms: 30_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in milliseconds.
    pub window_ms: u64,

    /// Requests admitted per client per window.
    pub max_requests: u32,

    /// Upper bound on tracked client windows.
    pub max_tracked_clients: usize,

    /// How the client key is derived from a request.
    pub client_key: ClientKeyConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
            max_tracked_clients: 100_000,
            client_key: ClientKeyConfig::default(),
        }
    }
}

/// Client key extraction strategy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ClientKeyConfig {
    /// Socket peer IP.
    #[default]
    Peer,
    /// Left-most `X-Forwarded-For` entry.
    ForwardedFor,
    /// Value of a named header.
    Header { name: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Liveness probe path.
    pub liveness_path: String,

    /// Readiness probe path.
    pub readiness_path: String,

    /// Metrics scrape path.
    pub metrics_path: String,

    /// Histogram bucket upper bounds for request duration, in milliseconds.
    pub duration_buckets_ms: Vec<f64>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            liveness_path: "/health".to_string(),
            readiness_path: "/readiness".to_string(),
            metrics_path: "/metrics".to_string(),
            duration_buckets_ms: vec![0.1, 5.0, 15.0, 50.0, 100.0, 500.0, 1000.0, 5000.0],
        }
    }
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Generic error bodies only.
    #[default]
    Production,
    /// Error bodies include diagnostic detail.
    Development,
}

impl DeploymentMode {
    /// `production` selects production mode; any other value is development.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, DeploymentMode::Development)
    }
}

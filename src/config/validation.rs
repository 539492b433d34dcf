//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate route prefixes, rewrites and backend target URLs
//! - Validate value ranges (timeouts > 0, limits > 0, buckets ascending)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::{ClientKeyConfig, GatewayConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("route `{route}`: prefix {prefix:?} must start with '/'")]
    InvalidPrefix { route: String, prefix: String },

    #[error("route `{route}`: rewrite {rewrite:?} must be empty or start with '/'")]
    InvalidRewrite { route: String, rewrite: String },

    #[error("route `{route}`: target {target:?} is invalid: {reason}")]
    InvalidTarget {
        route: String,
        target: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field}: path {path:?} must start with '/'")]
    InvalidOperationalPath { field: &'static str, path: String },

    #[error("duration buckets must be finite and strictly increasing")]
    InvalidBuckets,

    #[error("client key header name {0:?} is not a valid header name")]
    InvalidClientKeyHeader(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.max_connections == 0 {
        errors.push(zero("listener.max_connections"));
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    for route in &config.routes {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                route: route.name.clone(),
                prefix: route.prefix.clone(),
            });
        }

        if let Some(rewrite) = &route.rewrite_to {
            if !rewrite.is_empty() && !rewrite.starts_with('/') {
                errors.push(ValidationError::InvalidRewrite {
                    route: route.name.clone(),
                    rewrite: rewrite.clone(),
                });
            }
        }

        if let Err(reason) = check_target(&route.target) {
            errors.push(ValidationError::InvalidTarget {
                route: route.name.clone(),
                target: route.target.clone(),
                reason,
            });
        }

        if route.max_connections == 0 {
            errors.push(zero(&format!("routes.{}.max_connections", route.name)));
        }
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(zero("timeouts.connect_ms"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(zero("timeouts.request_ms"));
    }

    let rate = &config.rate_limit;
    if rate.enabled {
        if rate.window_ms == 0 {
            errors.push(zero("rate_limit.window_ms"));
        }
        if rate.max_requests == 0 {
            errors.push(zero("rate_limit.max_requests"));
        }
        if rate.max_tracked_clients == 0 {
            errors.push(zero("rate_limit.max_tracked_clients"));
        }
    }
    if let ClientKeyConfig::Header { name } = &rate.client_key {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidClientKeyHeader(name.clone()));
        }
    }

    let obs = &config.observability;
    for (field, path) in [
        ("observability.liveness_path", &obs.liveness_path),
        ("observability.readiness_path", &obs.readiness_path),
        ("observability.metrics_path", &obs.metrics_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidOperationalPath {
                field,
                path: path.clone(),
            });
        }
    }

    let buckets = &obs.duration_buckets_ms;
    let ascending = buckets.windows(2).all(|pair| pair[0] < pair[1]);
    if buckets.is_empty() || !ascending || buckets.iter().any(|b| !b.is_finite()) {
        errors.push(ValidationError::InvalidBuckets);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn zero(field: &str) -> ValidationError {
    ValidationError::Zero {
        field: field.to_string(),
    }
}

fn check_target(target: &str) -> Result<(), String> {
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme `{}` (only http)", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}

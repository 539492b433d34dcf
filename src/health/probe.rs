//! Operational endpoints answered by the gateway itself.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::ObservabilityConfig;
use crate::health::state::ReadinessState;

/// Which operational endpoint a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Liveness,
    Readiness,
    Metrics,
}

#[derive(Debug)]
pub struct HealthProbe {
    liveness_path: String,
    readiness_path: String,
    metrics_path: String,
    readiness: ReadinessState,
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::from_config(&ObservabilityConfig::default())
    }
}

impl HealthProbe {
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            liveness_path: config.liveness_path.clone(),
            readiness_path: config.readiness_path.clone(),
            metrics_path: config.metrics_path.clone(),
            readiness: ReadinessState::new(),
        }
    }

    /// Exact path match; everything else goes through routing.
    pub fn classify(&self, path: &str) -> Option<ProbeKind> {
        if path == self.liveness_path {
            Some(ProbeKind::Liveness)
        } else if path == self.readiness_path {
            Some(ProbeKind::Readiness)
        } else if path == self.metrics_path {
            Some(ProbeKind::Metrics)
        } else {
            None
        }
    }

    pub fn mark_ready(&self) {
        self.readiness.mark_ready();
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn liveness(&self) -> Response {
        (StatusCode::OK, axum::Json(json!({ "status": "ok" }))).into_response()
    }

    pub fn readiness(&self) -> Response {
        if self.is_ready() {
            (StatusCode::OK, axum::Json(json!({ "status": "ready" }))).into_response()
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(json!({ "status": "starting" }))).into_response()
        }
    }

    /// Wrap a rendered metrics snapshot.
    pub fn metrics(&self, snapshot: String, content_type: &'static str) -> Response {
        let mut response = (StatusCode::OK, snapshot).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_only_exact_paths() {
        let probe = HealthProbe::default();
        assert_eq!(probe.classify("/health"), Some(ProbeKind::Liveness));
        assert_eq!(probe.classify("/readiness"), Some(ProbeKind::Readiness));
        assert_eq!(probe.classify("/metrics"), Some(ProbeKind::Metrics));
        assert_eq!(probe.classify("/health/deep"), None);
        assert_eq!(probe.classify("/api/health"), None);
    }

    #[test]
    fn readiness_flips_once_marked() {
        let probe = HealthProbe::default();
        assert_eq!(probe.readiness().status(), StatusCode::SERVICE_UNAVAILABLE);
        probe.mark_ready();
        assert_eq!(probe.readiness().status(), StatusCode::OK);
        assert_eq!(probe.liveness().status(), StatusCode::OK);
    }

    #[test]
    fn custom_paths() {
        let config = ObservabilityConfig {
            liveness_path: "/livez".into(),
            ..ObservabilityConfig::default()
        };
        let probe = HealthProbe::from_config(&config);
        assert_eq!(probe.classify("/livez"), Some(ProbeKind::Liveness));
        assert_eq!(probe.classify("/health"), None);
    }
}

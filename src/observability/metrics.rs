//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_request_duration_ms` (histogram): latency by route, method, status
//! - `gateway_rate_limited_total` (counter): rejected requests
//! - `gateway_proxy_errors_total` (counter): transport failures by route, kind
//!
//! # Design Decisions
//! - The Prometheus recorder is owned by [`MetricsRecorder`], never installed
//!   as the process-global recorder; each instance is isolated
//! - Labels are bounded: route templates, not raw paths; unknown methods
//!   collapse to `OTHER`
//! - Bucket boundaries are fixed at construction

use axum::http::Method;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::upstream::ProxyErrorKind;

pub const REQUEST_DURATION_MS: &str = "http_request_duration_ms";
pub const RATE_LIMITED_TOTAL: &str = "gateway_rate_limited_total";
pub const PROXY_ERRORS_TOTAL: &str = "gateway_proxy_errors_total";

/// Content type of [`MetricsRecorder::snapshot`].
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub const DEFAULT_BUCKETS_MS: [f64; 8] = [0.1, 5.0, 15.0, 50.0, 100.0, 500.0, 1000.0, 5000.0];

/// Aggregates request observations and renders them for scraping.
pub struct MetricsRecorder {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder").finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// Build a recorder whose duration histogram uses `buckets_ms`.
    pub fn new(buckets_ms: &[f64]) -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION_MS.to_string()), buckets_ms)?
            .build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_histogram!(REQUEST_DURATION_MS, Unit::Milliseconds, "Duration of HTTP requests in ms");
            describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by the rate limiter");
            describe_counter!(PROXY_ERRORS_TOTAL, "Backend transport failures");
        });

        Ok(Self { recorder, handle })
    }

    /// Record one finished request.
    pub fn observe(&self, route: &str, method: &Method, status: u16, duration_ms: f64) {
        let labels = [
            ("route", route.to_owned()),
            ("method", method_label(method).to_owned()),
            ("status", status.to_string()),
        ];
        metrics::with_local_recorder(&self.recorder, || {
            histogram!(REQUEST_DURATION_MS, &labels).record(duration_ms);
        });
    }

    pub fn record_rate_limited(&self) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(RATE_LIMITED_TOTAL).increment(1);
        });
    }

    pub fn record_proxy_error(&self, route: &str, kind: ProxyErrorKind) {
        let labels = [("route", route.to_owned()), ("kind", kind.as_str().to_owned())];
        metrics::with_local_recorder(&self.recorder, || {
            counter!(PROXY_ERRORS_TOTAL, &labels).increment(1);
        });
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn snapshot(&self) -> String {
        self.handle.render()
    }
}

/// Bounded method label.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "OTHER",
    }
}

//! Locally generated responses.
//!
//! # Responsibilities
//! - Stable minimal bodies for 404, 429, 500, 502 and 504
//! - `RateLimit-*` and `Retry-After` headers from a [`RateDecision`]
//! - Error detail only in development mode
//!
//! # Design Decisions
//! - Production bodies never name a backend
//! - Rate headers are applied after the response is built, so proxied
//!   responses carry them too

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::config::DeploymentMode;
use crate::security::RateDecision;
use crate::upstream::ProxyError;

pub const RATE_LIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

pub fn json(status: StatusCode, body: Value) -> Response {
    (status, axum::Json(body)).into_response()
}

pub fn not_found() -> Response {
    json(StatusCode::NOT_FOUND, json!({ "message": "Not Found" }))
}

/// 429 with `Retry-After`. The `RateLimit-*` headers are added separately.
pub fn rate_limited(decision: &RateDecision) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(reset_seconds(decision)));
    response
}

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let policy = format!("{};w={}", decision.limit, decision.window.as_secs());
    if let Ok(value) = HeaderValue::from_str(&policy) {
        headers.insert(RATE_LIMIT_POLICY, value);
    }
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(reset_seconds(decision)));
}

/// Seconds until reset, rounded up.
fn reset_seconds(decision: &RateDecision) -> u64 {
    let millis = decision.reset_after.as_millis() as u64;
    millis.div_ceil(1000)
}

/// 502 or 504 for a failed forwarding attempt.
pub fn gateway_error(err: &ProxyError, mode: DeploymentMode) -> Response {
    let status = err.kind.status();
    let message = match status {
        StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
        _ => "Bad Gateway",
    };
    let detail = if mode.is_development() {
        json!({ "kind": err.kind.as_str(), "detail": err.detail, "target": err.target })
    } else {
        json!({})
    };
    json(status, json!({ "message": message, "error": detail }))
}

pub fn internal_error(detail: &str, mode: DeploymentMode) -> Response {
    let error = if mode.is_development() {
        json!({ "detail": detail })
    } else {
        json!({})
    };
    json(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "Internal Server Error", "error": error }),
    )
}

//! End-to-end routing, rate limiting and operational endpoint tests.

use std::sync::atomic::Ordering;

use api_gateway::config::{DeploymentMode, GatewayConfig};
use serde_json::{json, Value};

mod common;

use common::{client, histogram_count, route, single_route, start_echo_backend, start_gateway};

const DURATION: &str = "http_request_duration_ms";

#[tokio::test]
async fn login_is_rewritten_and_forwarded() {
    let (backend, hits) = start_echo_backend().await;
    let gateway = start_gateway(single_route("/api/auth", backend, Some("/auth"))).await;

    let response = client()
        .post(gateway.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body(r#"{"user":"amy","password":"pw"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["ratelimit-limit"], "100");
    assert_eq!(response.headers()["ratelimit-remaining"], "99");
    assert!(response.headers().contains_key("x-request-id"));

    let echo: Value = response.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["path"], "/auth/login");
    assert_eq!(echo["body"], r#"{"user":"amy","password":"pw"}"#);
    assert_eq!(echo["host"], backend.to_string());
    assert_eq!(echo["forwarded_for"], "127.0.0.1");
    assert_eq!(echo["forwarded_host"], gateway.addr.to_string());
    assert!(echo["request_id"].is_string());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let metrics = gateway.metrics();
    assert_eq!(
        histogram_count(&metrics, DURATION, &["route=\"/api/auth\"", "method=\"POST\"", "status=\"200\""]),
        1
    );
}

#[tokio::test]
async fn query_string_survives_rewrite() {
    let (backend, _) = start_echo_backend().await;
    let gateway = start_gateway(single_route("/api/users", backend, Some("/users"))).await;

    let echo: Value = client()
        .get(gateway.url("/api/users/42?expand=true&x=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["path"], "/users/42");
    assert_eq!(echo["query"], "expand=true&x=1");
}

#[tokio::test]
async fn longest_prefix_selects_backend() {
    let (general, general_hits) = start_echo_backend().await;
    let (users, user_hits) = start_echo_backend().await;
    let config = GatewayConfig {
        routes: vec![
            route("api", "/api", &format!("http://{general}"), None),
            route("users", "/api/users", &format!("http://{users}"), Some("/users")),
        ],
        ..GatewayConfig::default()
    };
    let gateway = start_gateway(config).await;
    let http = client();

    let echo: Value = http.get(gateway.url("/api/users/7")).send().await.unwrap().json().await.unwrap();
    assert_eq!(echo["path"], "/users/7");
    let echo: Value = http.get(gateway.url("/api/usersettings")).send().await.unwrap().json().await.unwrap();
    assert_eq!(echo["path"], "/api/usersettings");

    assert_eq!(user_hits.load(Ordering::SeqCst), 1);
    assert_eq!(general_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hundred_and_first_request_is_rate_limited() {
    let (backend, hits) = start_echo_backend().await;
    let gateway = start_gateway(single_route("/api/products", backend, Some("/products"))).await;
    let http = client();

    for i in 1..=100 {
        let response = http.get(gateway.url("/api/products")).send().await.unwrap();
        assert_eq!(response.status(), 200, "request {i}");
    }

    let rejected = http.get(gateway.url("/api/products")).send().await.unwrap();
    assert_eq!(rejected.status(), 429);
    assert_eq!(rejected.headers()["ratelimit-remaining"], "0");
    assert!(rejected.headers().contains_key("retry-after"));
    assert_eq!(rejected.text().await.unwrap(), "Too many requests, please try again later.");

    assert_eq!(hits.load(Ordering::SeqCst), 100);
    let metrics = gateway.metrics();
    assert_eq!(histogram_count(&metrics, DURATION, &["route=\"none\"", "status=\"429\""]), 1);
    assert_eq!(histogram_count(&metrics, DURATION, &["route=\"/api/products\"", "status=\"200\""]), 100);
    assert!(metrics.contains("gateway_rate_limited_total 1"), "{metrics}");
}

#[tokio::test]
async fn unknown_path_is_404_and_observed() {
    let gateway = start_gateway(GatewayConfig::default()).await;

    let response = client().get(gateway.url("/unknown")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Not Found" }));

    let exposition = client().get(gateway.url("/metrics")).send().await.unwrap();
    assert_eq!(
        exposition.headers()["content-type"],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let text = exposition.text().await.unwrap();
    assert_eq!(
        histogram_count(&text, DURATION, &["route=\"none\"", "method=\"GET\"", "status=\"404\""]),
        1
    );
}

#[tokio::test]
async fn health_is_served_while_rate_limited() {
    let mut config = GatewayConfig::default();
    config.rate_limit.max_requests = 1;
    let gateway = start_gateway(config).await;
    let http = client();

    assert_eq!(http.get(gateway.url("/api/x")).send().await.unwrap().status(), 404);
    assert_eq!(http.get(gateway.url("/api/x")).send().await.unwrap().status(), 429);

    let health = http.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert!(!health.headers().contains_key("ratelimit-limit"));
    let body: Value = health.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn readiness_reports_ready_once_serving() {
    let gateway = start_gateway(GatewayConfig::default()).await;
    let response = client().get(gateway.url("/readiness")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ready" }));
}

#[tokio::test]
async fn disabled_limiter_sends_no_rate_headers() {
    let (backend, _) = start_echo_backend().await;
    let mut config = single_route("/", backend, None);
    config.rate_limit.enabled = false;
    config.mode = DeploymentMode::Development;
    let gateway = start_gateway(config).await;

    let response = client().get(gateway.url("/anything")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(!response.headers().contains_key("ratelimit-limit"));
    let echo: Value = response.json().await.unwrap();
    assert_eq!(echo["path"], "/anything");
}

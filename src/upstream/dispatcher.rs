//! Forwarding a single request to a backend target.
//!
//! # Responsibilities
//! - Wait for a concurrency slot on the backend
//! - Build the outbound request (URI, forwarding headers, streamed body)
//! - Bound slot wait, connect and response head by the request timeout
//! - Classify transport failures into [`ProxyError`]
//!
//! Exactly one attempt is made per call. The same timeout later bounds the
//! gap between relayed body frames (see `pipeline::finalize`).

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response};
use hyper::body::Incoming;

use crate::security::headers;
use crate::upstream::error::{ProxyError, ProxyErrorKind};
use crate::upstream::target::{BackendTarget, TargetSlot};

/// What the pipeline hands over for forwarding.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path after rewriting.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub client_ip: IpAddr,
}

/// A backend response head with the slot that must outlive its body.
#[derive(Debug)]
pub struct BackendResponse {
    pub response: Response<Incoming>,
    pub slot: TargetSlot,
}

#[derive(Debug, Clone)]
pub struct ProxyDispatcher {
    timeout: Duration,
}

impl ProxyDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn forward(
        &self,
        target: &BackendTarget,
        request: OutboundRequest,
    ) -> Result<BackendResponse, ProxyError> {
        let target_url = target.base_url().to_string();
        match tokio::time::timeout(self.timeout, self.attempt(target, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::timeout(target_url, self.timeout)),
        }
    }

    async fn attempt(
        &self,
        target: &BackendTarget,
        request: OutboundRequest,
    ) -> Result<BackendResponse, ProxyError> {
        let target_url = target.base_url().to_string();
        let slot = target.acquire().await.ok_or_else(|| {
            ProxyError::new(ProxyErrorKind::Transport, target_url.clone(), "backend slots closed")
        })?;

        let uri = target
            .uri_for(&request.path, request.query.as_deref())
            .map_err(|e| ProxyError::new(ProxyErrorKind::Transport, target_url.clone(), e.to_string()))?;

        let OutboundRequest {
            method,
            mut headers,
            body,
            client_ip,
            ..
        } = request;
        headers::prepare_upstream(&mut headers, target.authority(), client_ip);

        let mut outbound = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(|e| ProxyError::new(ProxyErrorKind::Transport, target_url.clone(), e.to_string()))?;
        *outbound.headers_mut() = headers;

        tracing::trace!(backend = %target, uri = %outbound.uri(), "Forwarding request");

        let response = target
            .client()
            .request(outbound)
            .await
            .map_err(|e| ProxyError::from_transport(target_url, &e))?;

        Ok(BackendResponse { response, slot })
    }
}

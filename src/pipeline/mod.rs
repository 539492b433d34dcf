//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → operational path?   → HealthProbe          (HandledLocally)
//!     → RateLimiter::admit  → 429                  (Rejected)
//!     → RouteTable::resolve → 404                  (NotFound)
//!     → ProxyDispatcher     → 502 / 504            (ProxyError)
//!                           → backend response     (Proxied)
//!     → Finalizer (exactly once, on every path)
//! ```
//!
//! # Design Decisions
//! - Collaborators are injected; nothing is global
//! - Panics in a stage are caught here and answered with 500
//! - Proxied bodies are streamed; finalization travels with the body

pub mod context;
pub mod finalize;

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, HttpBody};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use futures_util::FutureExt;

use crate::config::DeploymentMode;
use crate::health::{HealthProbe, ProbeKind};
use crate::http::request::request_id_of;
use crate::http::response;
use crate::observability::metrics::EXPOSITION_CONTENT_TYPE;
use crate::observability::MetricsRecorder;
use crate::routing::RouteTable;
use crate::security::{headers, ClientKeyStrategy, RateLimiter};
use crate::upstream::{BackendResponse, OutboundRequest, ProxyDispatcher};

pub use context::{Outcome, RequestContext};
pub use finalize::{Finalizer, ObservedBody};

/// Result of the stage sequence, before finalization.
enum Reply {
    Local(Response),
    Proxied(BackendResponse),
}

pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    routes: Arc<RouteTable>,
    dispatcher: ProxyDispatcher,
    metrics: Arc<MetricsRecorder>,
    probe: Arc<HealthProbe>,
    client_keys: ClientKeyStrategy,
    mode: DeploymentMode,
    #[cfg(test)]
    panic_path: Option<&'static str>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("routes", &self.routes.len())
            .field("client_keys", &self.client_keys)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        routes: Arc<RouteTable>,
        dispatcher: ProxyDispatcher,
        metrics: Arc<MetricsRecorder>,
        probe: Arc<HealthProbe>,
    ) -> Self {
        Self {
            limiter,
            routes,
            dispatcher,
            metrics,
            probe,
            client_keys: ClientKeyStrategy::default(),
            mode: DeploymentMode::default(),
            #[cfg(test)]
            panic_path: None,
        }
    }

    pub fn with_client_keys(mut self, strategy: ClientKeyStrategy) -> Self {
        self.client_keys = strategy;
        self
    }

    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn probe(&self) -> &Arc<HealthProbe> {
        &self.probe
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run one request through every stage. Never fails; every error
    /// becomes a response.
    pub async fn handle(&self, peer: SocketAddr, request: Request<Body>) -> Response {
        let method = request.method().clone();
        let client_key = self.client_keys.extract(request.headers(), peer);
        let mut ctx = RequestContext::new(method.clone(), request.uri().path(), client_key);
        ctx.request_id = request_id_of(request.headers());
        let mut finalizer = Finalizer::new(self.metrics.clone(), ctx);

        let staged = AssertUnwindSafe(self.run_stages(finalizer.context_mut(), peer, request))
            .catch_unwind()
            .await;
        let rate = finalizer.context().rate;

        let mut response = match staged {
            Ok(Reply::Local(response)) => {
                finalizer.finish(response.status().as_u16());
                response
            }
            Ok(Reply::Proxied(backend)) => stream_back(finalizer, &method, backend, self.dispatcher.timeout()),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                let ctx = finalizer.context_mut();
                ctx.transition(Outcome::Internal);
                ctx.detail = Some(detail.clone());
                finalizer.finish(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
                response::internal_error(&detail, self.mode)
            }
        };

        if let Some(decision) = rate {
            response::apply_rate_limit_headers(response.headers_mut(), &decision);
        }
        response
    }

    async fn run_stages(&self, ctx: &mut RequestContext, peer: SocketAddr, request: Request<Body>) -> Reply {
        if let Some(kind) = self.probe.classify(&ctx.path) {
            ctx.route = Some(ctx.path.clone());
            ctx.transition(Outcome::HandledLocally);
            let response = match kind {
                ProbeKind::Liveness => self.probe.liveness(),
                ProbeKind::Readiness => self.probe.readiness(),
                ProbeKind::Metrics => self.probe.metrics(self.metrics.snapshot(), EXPOSITION_CONTENT_TYPE),
            };
            return Reply::Local(response);
        }

        if self.limiter.is_enabled() {
            let decision = self.limiter.admit(&ctx.client_key, Instant::now());
            ctx.rate = Some(decision);
            if !decision.admitted {
                ctx.transition(Outcome::Rejected);
                self.metrics.record_rate_limited();
                return Reply::Local(response::rate_limited(&decision));
            }
        }
        ctx.transition(Outcome::Admitted);

        #[cfg(test)]
        if self.panic_path.is_some_and(|path| path == ctx.path) {
            panic!("stage failure on {}", ctx.path);
        }

        let Some(resolution) = self.routes.resolve(&ctx.path) else {
            ctx.transition(Outcome::NotFound);
            return Reply::Local(response::not_found());
        };
        let entry = resolution.entry;
        let target = entry.target();
        ctx.route = Some(entry.prefix().to_string());
        ctx.target = Some(target.base_url().to_string());

        let (parts, body) = request.into_parts();
        let outbound = OutboundRequest {
            method: parts.method,
            path: resolution.rewritten_path,
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            client_ip: peer.ip(),
        };

        match self.dispatcher.forward(target, outbound).await {
            Ok(backend) => {
                ctx.transition(Outcome::Proxied);
                Reply::Proxied(backend)
            }
            Err(err) => {
                ctx.transition(Outcome::ProxyError(err.kind));
                ctx.detail = Some(err.detail.clone());
                self.metrics.record_proxy_error(ctx.route_label(), err.kind);
                Reply::Local(response::gateway_error(&err, self.mode))
            }
        }
    }
}

/// Relay a backend response, finalizing when its body completes. `idle`
/// bounds the gap between body frames.
fn stream_back(finalizer: Finalizer, method: &Method, backend: BackendResponse, idle: Duration) -> Response {
    let BackendResponse { response, slot } = backend;
    let (mut parts, incoming) = response.into_parts();
    headers::prepare_downstream(&mut parts.headers);
    let status = parts.status;

    let bodiless = *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || incoming.is_end_stream();
    if bodiless {
        drop(slot);
        finalizer.finish(status.as_u16());
        return Response::from_parts(parts, Body::empty());
    }

    let body = ObservedBody::new(incoming, finalizer, status.as_u16(), Some(slot)).with_idle_timeout(idle);
    Response::from_parts(parts, Body::new(body))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in request pipeline".to_string()
    }
}

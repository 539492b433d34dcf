//! Exactly-once request finalization.
//!
//! A [`Finalizer`] is created when a request enters the pipeline and records
//! one metrics sample plus one access log event, whichever way the request
//! ends. Dropping it unfinished means the client went away.
//!
//! For proxied responses it moves into [`ObservedBody`], which finalizes
//! when the body ends, fails, stalls, or is dropped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Bytes, HttpBody};
use axum::BoxError;
use hyper::body::{Frame, SizeHint};
use tokio::time::{Instant, Sleep};

use crate::observability::MetricsRecorder;
use crate::pipeline::context::{Outcome, RequestContext};
use crate::upstream::{ProxyErrorKind, TargetSlot};

/// Status recorded when the client disconnected before completion.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

const BAD_GATEWAY: u16 = 502;

pub struct Finalizer {
    metrics: Arc<MetricsRecorder>,
    ctx: RequestContext,
    done: bool,
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("ctx", &self.ctx)
            .field("done", &self.done)
            .finish()
    }
}

impl Finalizer {
    pub fn new(metrics: Arc<MetricsRecorder>, ctx: RequestContext) -> Self {
        Self {
            metrics,
            ctx,
            done: false,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.ctx
    }

    /// Record the request with its final status.
    pub fn finish(mut self, status: u16) {
        self.record(status);
    }

    /// The backend body failed after the head was relayed.
    pub fn fail_stream(mut self, detail: String) {
        self.ctx.transition(Outcome::StreamInterrupted);
        self.ctx.detail = Some(detail);
        self.metrics
            .record_proxy_error(self.ctx.route_label(), ProxyErrorKind::StreamInterrupted);
        self.record(BAD_GATEWAY);
    }

    fn record(&mut self, status: u16) {
        if self.done {
            return;
        }
        self.done = true;

        let ctx = &self.ctx;
        let elapsed = ctx.started.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.metrics.observe(ctx.route_label(), &ctx.method, status, duration_ms);

        let outcome = ctx.outcome();
        let request_id = ctx.request_id.as_deref().unwrap_or("-");
        if outcome.is_failure() {
            tracing::warn!(
                request_id = %request_id,
                method = %ctx.method,
                path = %ctx.path,
                route = %ctx.route_label(),
                backend = %ctx.target.as_deref().unwrap_or("-"),
                status,
                duration_ms,
                outcome = outcome.as_str(),
                client = %ctx.client_key,
                detail = %ctx.detail.as_deref().unwrap_or(""),
                "Request failed"
            );
        } else {
            tracing::info!(
                request_id = %request_id,
                method = %ctx.method,
                path = %ctx.path,
                route = %ctx.route_label(),
                status,
                duration_ms,
                outcome = outcome.as_str(),
                client = %ctx.client_key,
                "Request completed"
            );
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if !self.done {
            self.ctx.transition(Outcome::StreamInterrupted);
            if self.ctx.detail.is_none() {
                self.ctx.detail = Some("client disconnected".to_string());
            }
            self.record(CLIENT_CLOSED_REQUEST);
        }
    }
}

/// The backend sent no body frame within the idle timeout.
#[derive(Debug, thiserror::Error)]
#[error("backend body idle for {0:?}")]
pub struct BodyIdleTimeout(pub Duration);

/// Deadline for the next body frame, pushed back on every frame.
struct IdleDeadline {
    period: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl IdleDeadline {
    fn new(period: Duration) -> Self {
        Self {
            period,
            sleep: Box::pin(tokio::time::sleep(period)),
        }
    }

    fn reset(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.period);
    }
}

/// Response body that finalizes the request when it completes.
///
/// Completion is detected from the inner body's end-of-stream flag as well
/// as its final `None` frame; hyper stops polling a body whose declared
/// length has been written.
pub struct ObservedBody<B> {
    inner: B,
    finalizer: Option<Finalizer>,
    status: u16,
    /// Backend slot, released as soon as the body is done.
    slot: Option<TargetSlot>,
    idle: Option<IdleDeadline>,
}

impl<B> ObservedBody<B> {
    pub fn new(inner: B, finalizer: Finalizer, status: u16, slot: Option<TargetSlot>) -> Self {
        Self {
            inner,
            finalizer: Some(finalizer),
            status,
            slot,
            idle: None,
        }
    }

    /// Fail the body when the backend goes quiet for `period` between frames.
    /// Must be called within a Tokio runtime.
    pub fn with_idle_timeout(mut self, period: Duration) -> Self {
        self.idle = Some(IdleDeadline::new(period));
        self
    }

    fn complete(&mut self) {
        self.idle = None;
        self.slot.take();
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(self.status);
        }
    }

    fn fail(&mut self, detail: String) {
        self.idle = None;
        self.slot.take();
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.fail_stream(detail);
        }
    }
}

impl<B> HttpBody for ObservedBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Into<BoxError> + fmt::Display,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(polled) => polled,
            Poll::Pending => {
                let Some(idle) = this.idle.as_mut() else {
                    return Poll::Pending;
                };
                if idle.sleep.as_mut().poll(cx).is_pending() {
                    return Poll::Pending;
                }
                let err = BodyIdleTimeout(idle.period);
                this.fail(err.to_string());
                return Poll::Ready(Some(Err(err.into())));
            }
        };

        match polled {
            Some(Ok(frame)) => {
                if this.inner.is_end_stream() {
                    this.complete();
                } else if let Some(idle) = this.idle.as_mut() {
                    idle.reset();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                this.fail(err.to_string());
                Poll::Ready(Some(Err(err.into())))
            }
            None => {
                this.complete();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

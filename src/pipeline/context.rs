//! Per-request state carried through the pipeline stages.
//!
//! # States
//! ```text
//! Pending → Admitted → Proxied | NotFound | ProxyError
//! Pending → Rejected | HandledLocally
//! Proxied → StreamInterrupted (body failed or client left mid-stream)
//! Pending | Admitted → StreamInterrupted (client left)
//! any → Internal (panic)
//! ```

use std::time::Instant;

use axum::http::Method;

use crate::security::{ClientKey, RateDecision};
use crate::upstream::ProxyErrorKind;

/// Route label for requests that never matched a route.
pub const UNMATCHED_ROUTE: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Admitted,
    Rejected,
    NotFound,
    Proxied,
    ProxyError(ProxyErrorKind),
    HandledLocally,
    StreamInterrupted,
    Internal,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending | Outcome::Admitted)
    }

    pub fn can_transition_to(&self, next: Outcome) -> bool {
        use Outcome::*;
        match (self, next) {
            (Pending, Admitted | Rejected | HandledLocally) => true,
            (Admitted, NotFound | Proxied | ProxyError(_)) => true,
            (Pending | Admitted, StreamInterrupted | Internal) => true,
            (Proxied, StreamInterrupted) => true,
            (current, Internal) => *current != Internal,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Admitted => "admitted",
            Outcome::Rejected => "rejected",
            Outcome::NotFound => "not_found",
            Outcome::Proxied => "proxied",
            Outcome::ProxyError(_) => "proxy_error",
            Outcome::HandledLocally => "handled_locally",
            Outcome::StreamInterrupted => "stream_interrupted",
            Outcome::Internal => "internal",
        }
    }

    /// Outcomes logged at `warn`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::ProxyError(_) | Outcome::StreamInterrupted | Outcome::Internal
        )
    }
}

#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub started: Instant,
    pub client_key: ClientKey,
    /// Route template, or the operational path for local endpoints.
    pub route: Option<String>,
    /// Backend base URL once a route matched.
    pub target: Option<String>,
    pub request_id: Option<String>,
    pub rate: Option<RateDecision>,
    pub detail: Option<String>,
    outcome: Outcome,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, client_key: ClientKey) -> Self {
        Self {
            method,
            path: path.into(),
            started: Instant::now(),
            client_key,
            route: None,
            target: None,
            request_id: None,
            rate: None,
            detail: None,
            outcome: Outcome::Pending,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn route_label(&self) -> &str {
        self.route.as_deref().unwrap_or(UNMATCHED_ROUTE)
    }

    /// Move to `next` if allowed. Returns whether the outcome changed.
    pub fn transition(&mut self, next: Outcome) -> bool {
        if self.outcome.can_transition_to(next) {
            self.outcome = next;
            true
        } else {
            tracing::debug!(from = self.outcome.as_str(), to = next.as_str(), "Ignored outcome transition");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/api/users", ClientKey::new("10.0.0.1"))
    }

    #[test]
    fn happy_path_transitions() {
        let mut ctx = ctx();
        assert!(ctx.transition(Outcome::Admitted));
        assert!(ctx.transition(Outcome::Proxied));
        assert!(ctx.outcome().is_terminal());
        assert!(ctx.transition(Outcome::StreamInterrupted));
        assert_eq!(ctx.outcome(), Outcome::StreamInterrupted);
    }

    #[test]
    fn terminal_states_are_exclusive() {
        let mut ctx = ctx();
        assert!(ctx.transition(Outcome::Rejected));
        assert!(!ctx.transition(Outcome::Admitted));
        assert!(!ctx.transition(Outcome::NotFound));
        assert!(!ctx.transition(Outcome::StreamInterrupted));
        assert_eq!(ctx.outcome(), Outcome::Rejected);
    }

    #[test]
    fn panic_overrides_any_outcome() {
        let mut ctx = ctx();
        assert!(ctx.transition(Outcome::Admitted));
        assert!(ctx.transition(Outcome::NotFound));
        assert!(ctx.transition(Outcome::Internal));
        assert_eq!(ctx.outcome(), Outcome::Internal);
        assert!(!ctx.transition(Outcome::Internal));
    }

    #[test]
    fn not_found_requires_admission() {
        let mut ctx = ctx();
        assert!(!ctx.transition(Outcome::NotFound));
        assert_eq!(ctx.outcome(), Outcome::Pending);
    }

    #[test]
    fn unmatched_route_label() {
        let mut ctx = ctx();
        assert_eq!(ctx.route_label(), "none");
        ctx.route = Some("/api/users".into());
        assert_eq!(ctx.route_label(), "/api/users");
    }
}

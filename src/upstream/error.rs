//! Transport failures while forwarding to a backend.
//!
//! A backend that answers, whatever the status, is not an error here: its
//! response is relayed verbatim. Only failures to obtain a response are
//! classified.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;

/// Classification of a backend transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyErrorKind {
    /// Nothing listens on the backend address.
    ConnectionRefused,
    /// No response head within the request deadline.
    Timeout,
    /// The backend host name did not resolve.
    DnsFailure,
    /// The backend closed the connection before or while responding.
    StreamInterrupted,
    /// Any other transport failure.
    Transport,
}

impl ProxyErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyErrorKind::ConnectionRefused => "connection_refused",
            ProxyErrorKind::Timeout => "timeout",
            ProxyErrorKind::DnsFailure => "dns_failure",
            ProxyErrorKind::StreamInterrupted => "stream_interrupted",
            ProxyErrorKind::Transport => "transport",
        }
    }

    /// Status returned to the client. Timeouts map to 504, everything else 502.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ProxyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed forwarding attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} forwarding to {target}: {detail}")]
pub struct ProxyError {
    pub kind: ProxyErrorKind,
    /// Backend base URL.
    pub target: String,
    /// Human-readable cause, only exposed in development mode.
    pub detail: String,
}

impl ProxyError {
    pub fn new(kind: ProxyErrorKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            detail: detail.into(),
        }
    }

    pub fn timeout(target: impl Into<String>, after: Duration) -> Self {
        Self::new(
            ProxyErrorKind::Timeout,
            target,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    /// Classify a client error by walking its source chain.
    pub fn from_transport(target: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        Self::new(classify(err), target, render_chain(err))
    }
}

fn classify(err: &(dyn StdError + 'static)) -> ProxyErrorKind {
    let mut kind = ProxyErrorKind::Transport;
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::ConnectionRefused => return ProxyErrorKind::ConnectionRefused,
                io::ErrorKind::TimedOut => return ProxyErrorKind::Timeout,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => kind = ProxyErrorKind::StreamInterrupted,
                _ => {}
            }
        }

        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return ProxyErrorKind::Timeout;
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() || hyper_err.is_closed() {
                kind = ProxyErrorKind::StreamInterrupted;
            }
        }

        // hyper-util's connector reports resolver failures as "dns error".
        let message = e.to_string();
        if message.starts_with("dns error") || message.contains("failed to lookup address") {
            return ProxyErrorKind::DnsFailure;
        }

        current = e.source();
    }

    kind
}

fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let message = e.to_string();
        if !out.contains(&message) {
            out.push_str(": ");
            out.push_str(&message);
        }
        current = e.source();
    }
    out
}

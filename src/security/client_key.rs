//! Client key extraction for rate limiting.
//!
//! Keying on the socket address is spoofable behind shared NAT or an upstream
//! proxy, so the strategy is configurable.

use std::fmt;
use std::net::SocketAddr;

use axum::http::{header::HeaderName, HeaderMap};

use crate::config::ClientKeyConfig;
use crate::security::headers::X_FORWARDED_FOR;

/// Rate-limit bucket identifier. Carries no other meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a request is mapped to its [`ClientKey`].
#[derive(Debug, Clone, Default)]
pub enum ClientKeyStrategy {
    /// Socket peer IP.
    #[default]
    PeerAddr,
    /// Left-most `X-Forwarded-For` entry, falling back to the peer IP.
    ForwardedFor,
    /// Value of a header, falling back to the peer IP.
    Header(HeaderName),
}

impl ClientKeyStrategy {
    pub fn from_config(config: &ClientKeyConfig) -> Result<Self, axum::http::header::InvalidHeaderName> {
        Ok(match config {
            ClientKeyConfig::Peer => ClientKeyStrategy::PeerAddr,
            ClientKeyConfig::ForwardedFor => ClientKeyStrategy::ForwardedFor,
            ClientKeyConfig::Header { name } => {
                ClientKeyStrategy::Header(HeaderName::from_bytes(name.as_bytes())?)
            }
        })
    }

    pub fn extract(&self, headers: &HeaderMap, peer: SocketAddr) -> ClientKey {
        let from_header = match self {
            ClientKeyStrategy::PeerAddr => None,
            ClientKeyStrategy::ForwardedFor => headers
                .get(&X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
            ClientKeyStrategy::Header(name) => headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
        };

        ClientKey(from_header.unwrap_or_else(|| peer.ip().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:51234".parse().unwrap()
    }

    #[test]
    fn peer_strategy_ignores_port_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("1.1.1.1"));
        let key = ClientKeyStrategy::PeerAddr.extract(&headers, peer());
        assert_eq!(key.as_str(), "192.0.2.10");
    }

    #[test]
    fn forwarded_for_takes_left_most() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 1.1.1.1 , 10.0.0.1"));
        let key = ClientKeyStrategy::ForwardedFor.extract(&headers, peer());
        assert_eq!(key.as_str(), "1.1.1.1");

        let key = ClientKeyStrategy::ForwardedFor.extract(&HeaderMap::new(), peer());
        assert_eq!(key.as_str(), "192.0.2.10");
    }

    #[test]
    fn header_strategy_from_config() {
        let strategy = ClientKeyStrategy::from_config(&ClientKeyConfig::Header {
            name: "X-Api-Key".into(),
        })
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("tenant-7"));
        assert_eq!(strategy.extract(&headers, peer()).as_str(), "tenant-7");
    }
}

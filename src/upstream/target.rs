//! Backend target abstraction.
//!
//! # Responsibilities
//! - Represent a single backend service base URL
//! - Own the outbound HTTP client for that backend
//! - Enforce the per-backend concurrency cap via a semaphore

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Error building a backend target from configuration.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid backend url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("backend url {0:?} must use http")]
    UnsupportedScheme(String),
    #[error("backend url {0:?} has no usable authority")]
    Authority(String),
}

/// A single backend service.
#[derive(Debug)]
pub struct BackendTarget {
    name: String,
    base_url: Url,
    authority: Authority,
    /// Path component of the base URL without trailing slash ("" for root).
    base_path: String,
    client: Client<HttpConnector, Body>,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl BackendTarget {
    /// Create a backend target with its own connection pool.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        max_connections: usize,
        connect_timeout: Duration,
    ) -> Result<Self, TargetError> {
        let url = Url::parse(base_url).map_err(|source| TargetError::Url {
            url: base_url.to_string(),
            source,
        })?;
        if url.scheme() != "http" {
            return Err(TargetError::UnsupportedScheme(base_url.to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| TargetError::Authority(base_url.to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority: Authority = authority
            .parse()
            .map_err(|_| TargetError::Authority(base_url.to_string()))?;

        let base_path = url.path().trim_end_matches('/').to_string();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(max_connections)
            .build(connector);

        Ok(Self {
            name: name.into(),
            base_url: url,
            authority,
            base_path,
            client,
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Host (and port) used for the outbound `Host` header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn client(&self) -> &Client<HttpConnector, Body> {
        &self.client
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Wait for a free slot. The slot is released when dropped.
    pub async fn acquire(&self) -> Option<TargetSlot> {
        let permit = self.slots.clone().acquire_owned().await.ok()?;
        Some(TargetSlot { _permit: permit })
    }

    /// Absolute outbound URI for an already rewritten path.
    pub fn uri_for(&self, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
        let path_and_query = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_path, path, q),
            _ => format!("{}{}", self.base_path, path),
        };
        Uri::builder()
            .scheme("http")
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

/// A permit representing one outbound request slot on a backend.
///
/// Held until the backend response body has been fully relayed.
#[derive(Debug)]
pub struct TargetSlot {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> BackendTarget {
        BackendTarget::new("svc", url, 2, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn builds_uri_from_rewritten_path() {
        let t = target("http://user-service:8080");
        assert_eq!(
            t.uri_for("/users/42", Some("expand=true")).unwrap().to_string(),
            "http://user-service:8080/users/42?expand=true"
        );
        assert_eq!(t.authority().as_str(), "user-service:8080");
    }

    #[test]
    fn keeps_base_path() {
        let t = target("http://10.0.0.1/v2/");
        assert_eq!(t.uri_for("/auth/login", None).unwrap().to_string(), "http://10.0.0.1/v2/auth/login");
        assert_eq!(t.authority().as_str(), "10.0.0.1");
    }

    #[test]
    fn rejects_https() {
        let err = BackendTarget::new("svc", "https://secure", 1, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TargetError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn slots_bound_concurrency() {
        let t = target("http://127.0.0.1:1");
        let a = t.acquire().await.unwrap();
        let _b = t.acquire().await.unwrap();
        assert_eq!(t.in_flight(), 2);

        let waiting = tokio::time::timeout(Duration::from_millis(50), t.acquire()).await;
        assert!(waiting.is_err(), "third slot must wait");

        drop(a);
        assert_eq!(t.in_flight(), 1);
        assert!(t.acquire().await.is_some());
    }
}

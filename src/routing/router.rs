//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the matching route for a request path
//! - Return the matched route with its rewritten path, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Longest prefix wins; equal prefixes keep the first declared
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;
use std::time::Duration;

use crate::config::{RouteConfig, TimeoutConfig};
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::rewrite::PathRewrite;
use crate::upstream::{BackendTarget, TargetError};

/// A compiled route.
#[derive(Debug)]
pub struct RouteEntry {
    pub name: String,
    matcher: PathPrefixMatcher,
    target: Arc<BackendTarget>,
    rewrite: PathRewrite,
}

impl RouteEntry {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        target: Arc<BackendTarget>,
        rewrite: PathRewrite,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: PathPrefixMatcher::new(prefix),
            target,
            rewrite,
        }
    }

    /// The prefix doubles as the bounded `route` metrics label.
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn target(&self) -> &Arc<BackendTarget> {
        &self.target
    }

    pub fn rewrite(&self) -> &PathRewrite {
        &self.rewrite
    }
}

/// A matched route and the path to forward.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub entry: &'a RouteEntry,
    pub rewritten_path: String,
}

/// Ordered, immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Compile routes from configuration, one backend client per route.
    pub fn from_config(routes: &[RouteConfig], timeouts: &TimeoutConfig) -> Result<Self, TargetError> {
        let connect_timeout = Duration::from_millis(timeouts.connect_ms);
        let entries = routes
            .iter()
            .map(|route| {
                let target = BackendTarget::new(
                    route.name.clone(),
                    &route.target,
                    route.max_connections,
                    connect_timeout,
                )?;
                let rewrite = match &route.rewrite_to {
                    Some(to) => PathRewrite::replace_prefix(route.prefix.clone(), to.clone()),
                    None => PathRewrite::Keep,
                };
                tracing::debug!(
                    route = %route.name,
                    prefix = %route.prefix,
                    backend = %route.target,
                    "Compiled route"
                );
                Ok(RouteEntry::new(route.name.clone(), route.prefix.clone(), Arc::new(target), rewrite))
            })
            .collect::<Result<Vec<_>, TargetError>>()?;

        Ok(Self::new(entries))
    }

    /// Find the route for `path` and compute its forwarded path.
    pub fn resolve(&self, path: &str) -> Option<Resolution<'_>> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.entries {
            if !entry.matcher.matches(path) {
                continue;
            }
            match best {
                Some(current) if current.matcher.specificity() >= entry.matcher.specificity() => {}
                _ => best = Some(entry),
            }
        }

        best.map(|entry| Resolution {
            entry,
            rewritten_path: entry.rewrite.apply(path),
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

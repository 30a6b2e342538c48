//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (case-insensitive, port ignored)
//! - Match path prefix (case-sensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Empty condition list = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::http::{header, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches<B>(&self, req: &Request<B>) -> bool;
}

/// Matches the Host header, or the URI authority for absolute-form requests.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

/// Host part of a `host[:port]` value.
fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    authority.split(':').next().unwrap_or(authority)
}

impl Matcher for HostMatcher {
    fn matches<B>(&self, req: &Request<B>) -> bool {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()));
        host.map(|h| strip_port(h).eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches<B>(&self, req: &Request<B>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// A route's conditions, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    host: Option<HostMatcher>,
    path: Option<PathPrefixMatcher>,
}

impl RouteMatcher {
    pub fn new(host: Option<&str>, path_prefix: Option<&str>) -> Self {
        Self {
            host: host.map(HostMatcher::new),
            path: path_prefix.map(PathPrefixMatcher::new),
        }
    }

    /// Length of the path prefix, used to rank equal-priority routes.
    pub fn prefix_len(&self) -> usize {
        self.path.as_ref().map_or(0, |p| p.prefix().len())
    }
}

impl Matcher for RouteMatcher {
    fn matches<B>(&self, req: &Request<B>) -> bool {
        self.host.as_ref().map_or(true, |m| m.matches(req))
            && self.path.as_ref().map_or(true, |m| m.matches(req))
    }
}

//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes together with the engine each one dispatches to
//! - Look up the matching route for a request
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes pre-sorted by rank; typical tables are small

use axum::http::Request;

use crate::routing::matcher::{Matcher, RouteMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route<T> {
    pub name: String,
    pub priority: u32,
    matcher: RouteMatcher,
    pub target: T,
}

impl<T> Route<T> {
    pub fn new(
        name: impl Into<String>,
        host: Option<&str>,
        path_prefix: Option<&str>,
        priority: u32,
        target: T,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            matcher: RouteMatcher::new(host, path_prefix),
            target,
        }
    }

    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        self.matcher.matches(req)
    }
}

/// Ordered route table.
#[derive(Debug)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
}

impl<T> Router<T> {
    /// Highest priority first, then longest prefix; config order breaks ties.
    pub fn new(mut routes: Vec<Route<T>>) -> Self {
        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.matcher.prefix_len().cmp(&a.matcher.prefix_len()))
        });
        Self { routes }
    }

    pub fn match_request<B>(&self, req: &Request<B>) -> Option<&Route<T>> {
        self.routes.iter().find(|r| r.matches(req))
    }

    pub fn routes(&self) -> &[Route<T>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

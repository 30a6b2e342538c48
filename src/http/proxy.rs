//! HTTP reverse proxy engine.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → append client IP to X-Forwarded-For
//!     → strip hop-by-hop headers
//!     → pick upstream (scheduler when balanced, sole client otherwise)
//!     → rewrite Host (unless virtual hosting is disabled)
//!     → dispatch with optional deadline
//!         ├─ failure → 500 / 408 with the error text
//!         └─ success → strip hop-by-hop headers from the response
//! ```
//!
//! # Design Decisions
//! - Dispatch errors are answered locally, never propagated
//! - The client set is read concurrently; rebinding needs `&mut self`

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Version};
use axum::response::IntoResponse;

use crate::error::BuildError;
use crate::handle::{ConnectionInfo, ProxyHandle, Recyclable};
use crate::http::headers::{self, normalize_path};
use crate::http::options::{BuildOptions, ProxyBuilder, Targets};
use crate::http::upstream::UpstreamClient;
use crate::load_balancer::{Balancer, SmoothWeighted};
use crate::observability::metrics;

/// Why a dispatch produced no upstream response.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("upstream address is not bound")]
    Unbound,

    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("timeout: upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl DispatchError {
    /// Status reported to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Reverse proxy over one upstream or a weighted set of upstreams.
#[derive(Debug)]
pub struct ReverseProxy {
    clients: Vec<UpstreamClient>,
    balancer: Option<SmoothWeighted>,
    options: BuildOptions,
}

impl ReverseProxy {
    pub fn builder() -> ProxyBuilder {
        ProxyBuilder::new()
    }

    /// Build the client set described by validated `options`.
    pub fn with_options(options: BuildOptions) -> Result<Self, BuildError> {
        let (clients, balancer) = match &options.targets {
            None => return Err(BuildError::NoTargets),
            Some(Targets::Single(addr)) => (vec![UpstreamClient::new(addr.as_str(), &options)?], None),
            Some(Targets::Balanced(targets)) => {
                let clients = targets
                    .iter()
                    .map(|t| UpstreamClient::new(t.address.as_str(), &options))
                    .collect::<Result<Vec<_>, _>>()?;
                let weights = targets.iter().map(|t| t.weight).collect();
                let balancer = SmoothWeighted::new(weights).ok_or(BuildError::NoTargets)?;
                (clients, Some(balancer))
            }
        };

        if options.debug {
            tracing::debug!(
                proxy = %options.name,
                upstreams = ?clients.iter().map(UpstreamClient::addr).collect::<Vec<_>>(),
                balanced = balancer.is_some(),
                timeout = ?options.timeout,
                "Reverse proxy built"
            );
        }

        Ok(Self {
            clients,
            balancer,
            options,
        })
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn clients(&self) -> &[UpstreamClient] {
        &self.clients
    }

    /// Pick the upstream for the next request.
    fn client(&self) -> &UpstreamClient {
        match &self.balancer {
            Some(balancer) => &self.clients[balancer.select()],
            None => &self.clients[0],
        }
    }

    /// Point every upstream at `addr`.
    pub fn set_client(&mut self, addr: &str) -> &mut Self {
        for client in &mut self.clients {
            client.set_addr(addr);
        }
        self
    }

    /// Forward `request` and return the client-visible response.
    pub async fn proxy_request(&self, request: Request<Body>, conn: ConnectionInfo) -> axum::response::Response {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();

        headers::append_forwarded_for(&mut parts.headers, conn.remote_addr.ip());
        headers::strip_hop_by_hop(&mut parts.headers);

        let client = self.client();
        let raw = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let path_and_query = if self.options.normalize_path {
            let (path, query) = match raw.split_once('?') {
                Some((p, q)) => (p, Some(q)),
                None => (raw, None),
            };
            match query {
                Some(q) => format!("{}?{}", normalize_path(path), q),
                None => normalize_path(path).into_owned(),
            }
        } else {
            raw.to_string()
        };

        if self.options.virtual_host && client.is_bound() {
            if let Ok(host) = HeaderValue::from_str(client.addr()) {
                parts.headers.insert(header::HOST, host);
            }
        }

        if self.options.debug {
            tracing::debug!(
                proxy = %self.options.name,
                upstream = %client.addr(),
                method = %parts.method,
                path = %path_and_query,
                tls = client.is_tls(),
                "Proxying request"
            );
        }

        let result = self.dispatch(client, parts, body, &path_and_query).await;
        let response = match result {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                if self.options.debug {
                    tracing::debug!(
                        proxy = %self.options.name,
                        status = %parts.status,
                        headers = ?parts.headers,
                        "Upstream response"
                    );
                }
                headers::strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    proxy = %self.options.name,
                    upstream = %client.addr(),
                    error = %e,
                    "Upstream dispatch failed"
                );
                e.into_response()
            }
        };

        metrics::record_request(&self.options.name, client.addr(), response.status().as_u16(), start);
        response
    }

    async fn dispatch(
        &self,
        client: &UpstreamClient,
        mut parts: axum::http::request::Parts,
        body: Body,
        path_and_query: &str,
    ) -> Result<Response<hyper::body::Incoming>, DispatchError> {
        if !client.is_bound() {
            return Err(DispatchError::Unbound);
        }

        parts.uri = client.uri_for(path_and_query)?;
        parts.version = Version::HTTP_11;
        let request = Request::from_parts(parts, body);

        let fut = client.http().request(request);
        match self.options.timeout {
            None => Ok(fut.await?),
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(DispatchError::Timeout(limit)),
            },
        }
    }
}

impl Recyclable for ReverseProxy {
    fn rebind(&mut self, addr: &str) {
        self.set_client(addr);
    }

    fn reset(&mut self) {
        for client in &mut self.clients {
            client.clear_addr();
        }
    }

    fn close(self) {
        if self.options.debug {
            tracing::debug!(proxy = %self.options.name, "Reverse proxy closed");
        }
    }
}

impl ProxyHandle for ReverseProxy {
    async fn serve(&self, request: Request<Body>, conn: ConnectionInfo) -> axum::response::Response {
        self.proxy_request(request, conn).await
    }
}

//! Build options for the HTTP reverse proxy.
//!
//! Options are applied in call order on a [`ProxyBuilder`]; a later call
//! overrides an earlier one touching the same field. Validation happens once,
//! in [`ProxyBuilder::build`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::error::BuildError;
use crate::http::proxy::ReverseProxy;
use crate::load_balancer::WeightedTarget;
use crate::net::tls;

/// Upstream selection mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// A single upstream address (may be empty for an unbound handle).
    Single(String),
    /// Weighted upstreams distributed by the scheduler.
    Balanced(Vec<WeightedTarget>),
}

/// Immutable configuration of a [`ReverseProxy`].
#[derive(Clone)]
pub struct BuildOptions {
    pub targets: Option<Targets>,
    pub tls: Option<Arc<ClientConfig>>,
    /// Per-dispatch deadline; `None` waits as long as the transport does.
    pub timeout: Option<Duration>,
    pub virtual_host: bool,
    pub normalize_path: bool,
    /// Idle lifetime of pooled upstream connections.
    pub max_conn_duration: Option<Duration>,
    pub debug: bool,
    /// Label used in logs and metrics.
    pub name: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            targets: None,
            tls: None,
            timeout: None,
            virtual_host: true,
            normalize_path: true,
            max_conn_duration: None,
            debug: false,
            name: "reverse-proxy".to_string(),
        }
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("targets", &self.targets)
            .field("tls", &self.tls.is_some())
            .field("timeout", &self.timeout)
            .field("virtual_host", &self.virtual_host)
            .field("normalize_path", &self.normalize_path)
            .field("max_conn_duration", &self.max_conn_duration)
            .field("debug", &self.debug)
            .field("name", &self.name)
            .finish()
    }
}

impl BuildOptions {
    pub fn is_balanced(&self) -> bool {
        matches!(self.targets, Some(Targets::Balanced(_)))
    }
}

/// Builder for [`ReverseProxy`].
#[derive(Debug, Default)]
pub struct ProxyBuilder {
    options: BuildOptions,
    tls_error: Option<BuildError>,
}

impl ProxyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward to a single upstream, `host:port`. Disables balancing.
    pub fn target(mut self, addr: impl Into<String>) -> Self {
        self.options.targets = Some(Targets::Single(addr.into()));
        self
    }

    /// Distribute across weighted upstreams. Enables balancing.
    pub fn balancer<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<WeightedTarget>,
    {
        self.options.targets = Some(Targets::Balanced(
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Use a ready-made TLS client configuration towards upstreams.
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.options.tls = Some(config);
        self.tls_error = None;
        self
    }

    /// Load a PEM client certificate chain and key for upstream TLS.
    ///
    /// Load failures are reported by [`build`](Self::build).
    pub fn tls_files(mut self, cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Self {
        match tls::load_client_config(cert_path.as_ref(), key_path.as_ref()) {
            Ok(config) => {
                self.options.tls = Some(Arc::new(config));
                self.tls_error = None;
            }
            Err(e) => {
                self.options.tls = None;
                self.tls_error = Some(e);
            }
        }
        self
    }

    /// Bound each dispatch; zero means no deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Keep the inbound Host header instead of rewriting it to the upstream.
    pub fn disable_virtual_host(mut self) -> Self {
        self.options.virtual_host = false;
        self
    }

    /// Forward the request path byte-for-byte.
    pub fn disable_path_normalizing(mut self) -> Self {
        self.options.normalize_path = false;
        self
    }

    /// Recycle idle upstream connections after `duration`; zero disables.
    pub fn max_conn_duration(mut self, duration: Duration) -> Self {
        self.options.max_conn_duration = (!duration.is_zero()).then_some(duration);
        self
    }

    /// Emit per-request diagnostic events.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.options.debug = enabled;
        self
    }

    /// Label for logs and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Validate the applied options without building clients.
    pub fn into_options(self) -> Result<BuildOptions, BuildError> {
        if let Some(e) = self.tls_error {
            return Err(e);
        }
        match &self.options.targets {
            None => return Err(BuildError::NoTargets),
            Some(Targets::Balanced(targets)) if targets.is_empty() => {
                return Err(BuildError::NoTargets)
            }
            Some(_) => {}
        }
        Ok(self.options)
    }

    /// Validate the options and build the proxy.
    pub fn build(self) -> Result<ReverseProxy, BuildError> {
        ReverseProxy::with_options(self.into_options()?)
    }
}

//! Build options for the WebSocket reverse proxy.
//!
//! # Responsibilities
//! - Describe how backend connections are dialed ([`Dialer`])
//! - Describe how inbound connections are upgraded ([`Upgrader`])
//! - Validate the target URL once, in [`WsBuilder::build`]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::client::{Request as HandshakeRequest, Response as HandshakeResponse};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::BuildError;
use crate::handle::ConnectionInfo;
use crate::net::tls;
use crate::websocket::proxy::WsReverseProxy;

/// Backend side of a relayed session.
pub type BackendStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Produces extra headers for the backend handshake; applied last.
pub type ForwardHeaderFn = Arc<dyn Fn(&Parts, &ConnectionInfo) -> HeaderMap + Send + Sync>;

/// Decides whether an inbound handshake's origin is acceptable.
pub type OriginCheckFn = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why the backend handshake did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("backend dial timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Handshake(#[from] tungstenite::Error),
}

/// Opens backend WebSocket connections.
#[derive(Clone)]
pub struct Dialer {
    /// Bound on TCP connect plus handshake.
    pub connect_timeout: Duration,
    /// rustls configuration for `wss` targets.
    pub tls: Option<Arc<ClientConfig>>,
    pub config: Option<WebSocketConfig>,
    pub nodelay: bool,
}

impl Default for Dialer {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls: None,
            config: None,
            nodelay: true,
        }
    }
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("connect_timeout", &self.connect_timeout)
            .field("tls", &self.tls.is_some())
            .field("nodelay", &self.nodelay)
            .finish()
    }
}

impl Dialer {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    pub fn websocket_config(mut self, config: WebSocketConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Perform the backend handshake for `request`.
    pub async fn dial(&self, request: HandshakeRequest) -> Result<(BackendStream, HandshakeResponse), DialError> {
        let connector = match &self.tls {
            Some(config) => Connector::Rustls(config.clone()),
            None => Connector::Plain,
        };
        let connect = tokio_tungstenite::connect_async_tls_with_config(
            request,
            self.config.clone(),
            self.nodelay,
            Some(connector),
        );
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DialError::Timeout(self.connect_timeout)),
        }
    }
}

/// Settings applied to the inbound upgrade.
#[derive(Clone, Default)]
pub struct Upgrader {
    pub read_buffer_size: Option<usize>,
    pub write_buffer_size: Option<usize>,
    pub max_message_size: Option<usize>,
    pub check_origin: Option<OriginCheckFn>,
}

impl fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgrader")
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_message_size", &self.max_message_size)
            .field("check_origin", &self.check_origin.is_some())
            .finish()
    }
}

impl Upgrader {
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = Some(size);
        self
    }

    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = Some(size);
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Reject handshakes for which `check` returns false (403).
    pub fn check_origin<F>(mut self, check: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.check_origin = Some(Arc::new(check));
        self
    }

    pub fn origin_allowed(&self, parts: &Parts) -> bool {
        self.check_origin.as_ref().map_or(true, |check| check(parts))
    }

    pub(crate) fn apply(&self, mut upgrade: WebSocketUpgrade) -> WebSocketUpgrade {
        if let Some(size) = self.read_buffer_size {
            upgrade = upgrade.read_buffer_size(size);
        }
        if let Some(size) = self.write_buffer_size {
            upgrade = upgrade.write_buffer_size(size);
        }
        if let Some(size) = self.max_message_size {
            upgrade = upgrade.max_message_size(size);
        }
        upgrade
    }
}

/// Validated configuration of a [`WsReverseProxy`].
#[derive(Clone)]
pub struct WsOptions {
    pub target: Url,
    pub dialer: Dialer,
    pub upgrader: Upgrader,
    pub forward_header: Option<ForwardHeaderFn>,
    pub debug: bool,
    pub name: String,
}

impl fmt::Debug for WsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsOptions")
            .field("target", &self.target.as_str())
            .field("dialer", &self.dialer)
            .field("upgrader", &self.upgrader)
            .field("forward_header", &self.forward_header.is_some())
            .field("debug", &self.debug)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for [`WsReverseProxy`].
pub struct WsBuilder {
    target: Option<String>,
    dialer: Dialer,
    upgrader: Upgrader,
    forward_header: Option<ForwardHeaderFn>,
    debug: bool,
    name: String,
}

impl Default for WsBuilder {
    fn default() -> Self {
        Self {
            target: None,
            dialer: Dialer::default(),
            upgrader: Upgrader::default(),
            forward_header: None,
            debug: false,
            name: "websocket-proxy".to_string(),
        }
    }
}

impl WsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend URL, `ws://` or `wss://`.
    pub fn target(mut self, url: impl Into<String>) -> Self {
        self.target = Some(url.into());
        self
    }

    pub fn dialer(mut self, dialer: Dialer) -> Self {
        self.dialer = dialer;
        self
    }

    pub fn upgrader(mut self, upgrader: Upgrader) -> Self {
        self.upgrader = upgrader;
        self
    }

    /// Headers returned by `f` override the default forward set.
    pub fn forward_header<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parts, &ConnectionInfo) -> HeaderMap + Send + Sync + 'static,
    {
        self.forward_header = Some(Arc::new(f));
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Validate the applied options.
    pub fn into_options(self) -> Result<WsOptions, BuildError> {
        let raw = match self.target {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(BuildError::MissingTarget),
        };
        let target = parse_target(&raw)?;

        let mut dialer = self.dialer;
        if dialer.tls.is_none() {
            dialer.tls = Some(Arc::new(tls::default_client_config()?));
        }

        Ok(WsOptions {
            target,
            dialer,
            upgrader: self.upgrader,
            forward_header: self.forward_header,
            debug: self.debug,
            name: self.name,
        })
    }

    pub fn build(self) -> Result<WsReverseProxy, BuildError> {
        Ok(WsReverseProxy::with_options(self.into_options()?))
    }
}

/// Parse a backend URL, accepting only `ws` and `wss`.
pub fn parse_target(raw: &str) -> Result<Url, BuildError> {
    let url = Url::parse(raw).map_err(|source| BuildError::InvalidTarget {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(BuildError::UnsupportedScheme(other.to_string())),
    }
}

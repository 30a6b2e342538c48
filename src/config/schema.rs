//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route definitions, each owning one proxy engine.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS termination.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// PEM certificate chain and private key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// tracing-subscriber filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "relay_proxy=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A route and the engine behind it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (case-insensitive, port ignored).
    pub host: Option<String>,

    /// Path prefix to match; absent matches every path.
    pub path_prefix: Option<String>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// HTTP upstream; mutually exclusive with `websocket`.
    pub http: Option<HttpRouteConfig>,

    /// WebSocket upstream; mutually exclusive with `http`.
    pub websocket: Option<WebSocketRouteConfig>,
}

/// HTTP reverse proxy settings for one route.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpRouteConfig {
    /// Upstreams; more than one requires `balance`.
    pub targets: Vec<TargetConfig>,

    /// Distribute requests across `targets` by weight.
    pub balance: bool,

    /// Per-request upstream deadline; 0 = none.
    pub timeout_ms: u64,

    pub disable_virtual_host: bool,

    pub disable_path_normalizing: bool,

    /// Idle lifetime of pooled upstream connections; 0 = transport default.
    pub max_conn_duration_secs: u64,

    /// Client certificate presented to upstreams over TLS.
    pub tls: Option<TlsConfig>,

    pub debug: bool,

    /// Serve through a pool of reusable engines.
    pub pool: Option<PoolConfig>,
}

/// One upstream address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Engine pool capacities.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PoolConfig {
    #[serde(default)]
    pub initial_capacity: usize,

    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
}

fn default_max_capacity() -> usize {
    64
}

/// WebSocket reverse proxy settings for one route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSocketRouteConfig {
    /// Backend URL (`ws://` or `wss://`).
    pub target: String,

    /// Backend connect + handshake deadline.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub debug: bool,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

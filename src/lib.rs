//! Reverse proxy engine for HTTP and WebSocket traffic.
//!
//! Building blocks, leaves first:
//! - [`load_balancer`]: smooth weighted round-robin scheduler
//! - [`pool`]: bounded pool of reusable proxy handles
//! - [`http`]: HTTP reverse proxy engine and the axum gateway
//! - [`websocket`]: WebSocket reverse proxy with a duplex relay

pub mod config;
pub mod error;
pub mod handle;
pub mod http;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod pool;
pub mod routing;
pub mod websocket;

pub use config::schema::ProxyConfig;
pub use error::{BuildError, PoolError};
pub use handle::{ConnectionInfo, ProxyHandle, Recyclable};
pub use http::{HttpServer, ReverseProxy};
pub use pool::{ChannelPool, Pool};
pub use websocket::WsReverseProxy;

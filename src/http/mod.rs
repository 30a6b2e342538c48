//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, route lookup)
//!     → proxy.rs (ReverseProxy: headers, upstream choice, dispatch)
//!         → headers.rs (hop-by-hop, X-Forwarded-For, path normalization)
//!         → upstream.rs (pooled hyper client per upstream)
//!     → Send to client
//! ```

pub mod headers;
pub mod options;
pub mod proxy;
pub mod server;
pub mod upstream;

pub use options::{BuildOptions, ProxyBuilder, Targets};
pub use proxy::{DispatchError, ReverseProxy};
pub use server::{HttpServer, Upstream};
pub use upstream::UpstreamClient;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → HttpServer::new builds one engine per route
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields outside `[[routes]]` have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    HttpRouteConfig, ListenerConfig, ObservabilityConfig, PoolConfig, ProxyConfig, RouteConfig,
    TargetConfig, TlsConfig, WebSocketRouteConfig,
};
pub use validation::{validate_config, ValidationError};

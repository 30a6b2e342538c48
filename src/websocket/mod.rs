//! WebSocket reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! upgrade request
//!     → proxy.rs (validate, build forward headers, dial backend)
//!     → relay.rs (two relay tasks + coordinator)
//!     → session ends on the first close or error
//! ```
//!
//! # Design Decisions
//! - Exactly one backend connection per client session, no multiplexing
//! - A failed dial is answered before the client is upgraded, so clients
//!   never see a half-open session
//! - Termination of either direction tears down the whole session

pub mod options;
pub mod proxy;
pub mod relay;

pub use options::{Dialer, Upgrader, WsBuilder, WsOptions};
pub use proxy::WsReverseProxy;
pub use relay::RelayEnd;

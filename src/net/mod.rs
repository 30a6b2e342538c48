//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listener TLS:  cert + key files → tls.rs → axum-server RustlsConfig
//! Upstream TLS:  cert + key files → tls.rs → rustls ClientConfig
//!                                          → HTTPS connector / wss dialer
//! ```
//!
//! # Design Decisions
//! - TLS is optional on both sides and configured independently
//! - Credential material is loaded once, at construction

pub mod tls;

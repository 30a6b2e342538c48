//! Capability traits shared by both proxy engines and the resource pool.
//!
//! # Responsibilities
//! - Describe what a reusable proxy handle can do: serve, rebind, reset, close
//! - Carry per-connection facts the engines need (client address, TLS)
//!
//! # Design Decisions
//! - The pool only depends on [`Recyclable`], never on a concrete engine
//! - `close` consumes the handle; a closed engine cannot be used again

use std::future::Future;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

/// Facts about the inbound connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Peer address of the client connection.
    pub remote_addr: SocketAddr,
    /// Whether TLS was terminated at this proxy.
    pub tls: bool,
}

impl ConnectionInfo {
    /// Connection info for a plain-text listener.
    pub fn plain(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            tls: false,
        }
    }

    /// Connection info for a TLS-terminating listener.
    pub fn tls(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            tls: true,
        }
    }
}

/// A handle that can be pointed at a new upstream and recycled.
pub trait Recyclable: Send + Sync + 'static {
    /// Point every upstream of this handle at `addr`.
    fn rebind(&mut self, addr: &str);

    /// Clear upstream binding state before the handle is parked.
    fn reset(&mut self);

    /// Release the handle and everything it owns.
    fn close(self)
    where
        Self: Sized;
}

/// A proxy engine that can serve inbound requests.
pub trait ProxyHandle: Recyclable {
    /// Forward one inbound request and produce the client-visible response.
    ///
    /// Never fails: upstream problems become error responses.
    fn serve(
        &self,
        request: Request<Body>,
        conn: ConnectionInfo,
    ) -> impl Future<Output = Response> + Send;
}

//! WebSocket reverse proxy engine.
//!
//! # Data Flow
//! ```text
//! upgrade request
//!     → not an upgrade?        → extractor rejection
//!     → origin check fails?    → 403
//!     → build forward headers (Origin, Sec-WebSocket-Protocol, Cookie, Host,
//!       X-Forwarded-For, X-Forwarded-Proto, then custom overrides)
//!     → resolve backend URL (Override-Path, inbound query)
//!     → dial backend
//!         ├─ rejected handshake → backend status, headers and body
//!         ├─ other failure      → 503 with the error text
//!         └─ success            → 101 to the client, relay.rs takes over
//! ```

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::FromRequestParts;
use axum::http::header::{CONTENT_LENGTH, COOKIE, HOST, ORIGIN, SEC_WEBSOCKET_PROTOCOL, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, handshake::client::Request as HandshakeRequest};
use url::Url;

use crate::handle::{ConnectionInfo, ProxyHandle, Recyclable};
use crate::http::headers::{self, OVERRIDE_PATH, X_FORWARDED_FOR, X_FORWARDED_PROTO};
use crate::observability::metrics::{self, SessionOutcome};
use crate::websocket::options::{DialError, WsBuilder, WsOptions};
use crate::websocket::relay::{self, Session};

/// Headers copied from the inbound handshake when present.
const FORWARDED: [axum::http::HeaderName; 4] = [ORIGIN, SEC_WEBSOCKET_PROTOCOL, COOKIE, HOST];

/// Reverse proxy for WebSocket sessions; one backend connection per session.
#[derive(Debug, Clone)]
pub struct WsReverseProxy {
    /// Current backend URL; its authority changes on rebind.
    target: Url,
    options: WsOptions,
}

impl WsReverseProxy {
    pub fn builder() -> WsBuilder {
        WsBuilder::new()
    }

    pub fn with_options(options: WsOptions) -> Self {
        if options.debug {
            tracing::debug!(
                proxy = %options.name,
                target = %options.target,
                "WebSocket proxy built"
            );
        }
        Self {
            target: options.target.clone(),
            options,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn options(&self) -> &WsOptions {
        &self.options
    }

    /// Headers sent to the backend with the handshake.
    pub fn forward_headers(&self, parts: &Parts, conn: &ConnectionInfo) -> HeaderMap {
        let mut out = HeaderMap::new();
        for name in &FORWARDED {
            for value in parts.headers.get_all(name) {
                out.append(name.clone(), value.clone());
            }
        }
        if let Some(value) = headers::forwarded_for(&parts.headers, conn.remote_addr.ip()) {
            out.insert(X_FORWARDED_FOR, value);
        }
        out.insert(X_FORWARDED_PROTO, headers::forwarded_proto(conn.tls));

        if let Some(custom) = &self.options.forward_header {
            let custom = custom(parts, conn);
            for name in custom.keys() {
                out.remove(name);
            }
            for (name, value) in custom.iter() {
                out.append(name.clone(), value.clone());
            }
        }
        out
    }

    /// Backend URL for this handshake.
    ///
    /// `Override-Path` replaces the target path; an inbound query replaces the
    /// target query, otherwise the target's own query is kept.
    pub fn backend_url(&self, parts: &Parts) -> Url {
        let mut url = self.target.clone();
        if let Some(path) = parts.headers.get(OVERRIDE_PATH).and_then(|v| v.to_str().ok()) {
            url.set_path(path);
        }
        if let Some(query) = parts.uri.query() {
            url.set_query(Some(query));
        }
        url
    }

    fn handshake_request(&self, url: &Url, forward: HeaderMap) -> Result<HandshakeRequest, tungstenite::Error> {
        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for name in forward.keys() {
            headers.remove(name);
        }
        for (name, value) in forward.iter() {
            headers.append(name.clone(), value.clone());
        }
        Ok(request)
    }

    /// Upgrade `request` and relay it to the backend.
    pub async fn proxy_upgrade(&self, request: Request<Body>, conn: ConnectionInfo) -> Response {
        let (mut parts, _body) = request.into_parts();

        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                if self.options.debug {
                    tracing::debug!(proxy = %self.options.name, error = %rejection, "Not a WebSocket upgrade");
                }
                metrics::record_websocket_session(SessionOutcome::Rejected);
                return rejection.into_response();
            }
        };

        if !self.options.upgrader.origin_allowed(&parts) {
            tracing::warn!(
                proxy = %self.options.name,
                origin = ?parts.headers.get(ORIGIN),
                "WebSocket origin rejected"
            );
            metrics::record_websocket_session(SessionOutcome::Rejected);
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }

        let url = self.backend_url(&parts);
        let forward = self.forward_headers(&parts, &conn);
        if self.options.debug {
            tracing::debug!(
                proxy = %self.options.name,
                backend = %url,
                headers = ?forward,
                "Dialing WebSocket backend"
            );
        }

        let dialed = match self.handshake_request(&url, forward) {
            Ok(handshake) => self.options.dialer.dial(handshake).await,
            Err(e) => Err(DialError::Handshake(e)),
        };
        let (backend, handshake) = match dialed {
            Ok(dialed) => dialed,
            Err(e) => return self.dial_failure(&url, e),
        };

        let mut upgrade = self.options.upgrader.apply(upgrade);
        if let Some(protocol) = handshake
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
        {
            upgrade = upgrade.protocols([protocol.to_string()]);
        }

        let session = Session {
            proxy: self.options.name.clone(),
            backend: url.to_string(),
            debug: self.options.debug,
        };
        upgrade.on_upgrade(move |client| relay::run(client, backend, session))
    }

    fn dial_failure(&self, url: &Url, error: DialError) -> Response {
        metrics::record_websocket_session(SessionOutcome::DialFailed);
        match error {
            DialError::Handshake(tungstenite::Error::Http(rejected)) => {
                tracing::warn!(
                    proxy = %self.options.name,
                    backend = %url,
                    status = %rejected.status(),
                    "Backend rejected WebSocket handshake"
                );
                rejection_response(rejected.status(), rejected.headers(), rejected.body().as_deref())
            }
            other => {
                tracing::error!(
                    proxy = %self.options.name,
                    backend = %url,
                    error = %other,
                    "WebSocket backend dial failed"
                );
                (StatusCode::SERVICE_UNAVAILABLE, other.to_string()).into_response()
            }
        }
    }
}

/// Rebuild a backend's handshake rejection for the client.
///
/// The captured body is whatever arrived with the response head, still in
/// its wire framing. Framing headers are dropped so hyper frames the
/// relayed bytes itself; a chunked body is decoded first.
fn rejection_response(status: StatusCode, backend_headers: &HeaderMap, body: Option<&[u8]>) -> Response {
    let body = body.unwrap_or_default();
    let chunked = backend_headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"));
    let body = if chunked {
        dechunk(body).unwrap_or_else(|| body.to_vec())
    } else {
        body.to_vec()
    };

    let mut out = backend_headers.clone();
    headers::strip_hop_by_hop(&mut out);
    out.remove(TRANSFER_ENCODING);
    out.remove(CONTENT_LENGTH);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().extend(out);
    response
}

/// Decode a complete chunked body; `None` when it is malformed or cut short.
fn dechunk(mut raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[..line_end]).ok()?;
        // Chunk extensions follow a ';'.
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        raw = &raw[line_end + 2..];
        if size == 0 {
            return Some(out);
        }
        if raw.len() < size + 2 || &raw[size..size + 2] != b"\r\n" {
            return None;
        }
        out.extend_from_slice(&raw[..size]);
        raw = &raw[size + 2..];
    }
}

impl Recyclable for WsReverseProxy {
    /// Swap the backend authority for `addr` (`host:port`).
    fn rebind(&mut self, addr: &str) {
        let candidate = format!("{}://{}", self.target.scheme(), addr);
        match Url::parse(&candidate) {
            Ok(parsed) if parsed.host_str().is_some() => {
                // Both succeed for ws/wss URLs with a host.
                let _ = self.target.set_host(parsed.host_str());
                let _ = self.target.set_port(parsed.port());
            }
            _ => {
                tracing::warn!(proxy = %self.options.name, addr, "Ignoring invalid rebind address");
            }
        }
    }

    fn reset(&mut self) {
        self.target = self.options.target.clone();
    }

    fn close(self) {
        if self.options.debug {
            tracing::debug!(proxy = %self.options.name, "WebSocket proxy closed");
        }
    }
}

impl ProxyHandle for WsReverseProxy {
    async fn serve(&self, request: Request<Body>, conn: ConnectionInfo) -> Response {
        self.proxy_upgrade(request, conn).await
    }
}

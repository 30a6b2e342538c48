//! Shared mock backends and proxy launchers for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, Request, Uri},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use relay_proxy::config::ProxyConfig;
use relay_proxy::HttpServer;

/// Serve `router` on an ephemeral port with connect info.
pub async fn serve_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

/// Build the gateway for `config` and serve it on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> SocketAddr {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server.run(listener, std::future::pending()).await.unwrap();
    });
    addr
}

/// Start a raw TCP backend answering every connection with `raw_response`.
pub async fn start_raw_backend(raw_response: String) -> SocketAddr {
    start_delayed_raw_backend(raw_response, Duration::ZERO).await
}

/// Like [`start_raw_backend`], waiting `delay` before answering.
pub async fn start_delayed_raw_backend(raw_response: String, delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let raw = raw_response.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        tokio::time::sleep(delay).await;
                        let _ = socket.write_all(raw.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a simple mock backend that returns a fixed 200 body.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_raw_backend(format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ))
    .await
}

fn headers_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        out.insert(name.as_str().to_string(), Value::from(values.join(", ")));
    }
    out
}

/// Start a backend that describes the request it received as JSON.
///
/// Fields: `backend`, `method`, `path`, `query`, `version`, `headers`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let router = Router::new().fallback(move |req: Request<Body>| async move {
        Json(json!({
            "backend": name,
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query(),
            "version": format!("{:?}", req.version()),
            "headers": headers_json(req.headers()),
        }))
    });
    serve_router(router).await
}

/// Start a WebSocket backend.
///
/// Echoes every data frame. Two text commands are answered instead of echoed:
/// `uri?` returns the handshake URI, `header:<name>` returns that handshake
/// header. The backend accepts the `chat` sub-protocol.
pub async fn start_ws_backend() -> SocketAddr {
    start_observed_ws_backend().await.0
}

/// Like [`start_ws_backend`]; the receiver yields once per finished session.
pub async fn start_observed_ws_backend() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let router = Router::new().fallback(move |ws: WebSocketUpgrade, uri: Uri, headers: HeaderMap| {
        let done = done_tx.clone();
        async move {
            ws.protocols(["chat"]).on_upgrade(move |socket| async move {
                ws_session(socket, uri, headers).await;
                let _ = done.send(());
            })
        }
    });
    (serve_router(router).await, done_rx)
}

async fn ws_session(mut socket: WebSocket, uri: Uri, headers: HeaderMap) {
    while let Some(Ok(message)) = socket.recv().await {
        let reply = match message {
            Message::Text(text) if text.as_str() == "uri?" => Message::Text(uri.to_string().into()),
            Message::Text(text) if text.as_str().starts_with("header:") => {
                let name = &text.as_str()["header:".len()..];
                let value = headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("<none>")
                    .to_string();
                Message::Text(value.into())
            }
            Message::Text(text) if text.as_str() == "close-custom" => {
                let _ = socket
                    .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                        code: 4000,
                        reason: "backend says bye".into(),
                    })))
                    .await;
                return;
            }
            Message::Close(_) => return,
            other => other,
        };
        if socket.send(reply).await.is_err() {
            return;
        }
    }
}

/// A backend that rejects every WebSocket handshake with a chunked 403.
pub async fn start_ws_chunked_rejecting_backend() -> SocketAddr {
    start_raw_backend(
        "HTTP/1.1 403 Forbidden\r\nTransfer-Encoding: chunked\r\nX-Reject-Reason: origin\r\nConnection: close\r\n\r\n6\r\ndenied\r\n0\r\n\r\n"
            .to_string(),
    )
    .await
}

/// A backend that rejects every WebSocket handshake with 401.
pub async fn start_ws_rejecting_backend() -> SocketAddr {
    start_raw_backend(
        "HTTP/1.1 401 Unauthorized\r\nContent-Length: 6\r\nX-Reject-Reason: token\r\nConnection: close\r\n\r\ndenied"
            .to_string(),
    )
    .await
}

//! HTTP engine tests against live mock upstreams.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use relay_proxy::{ConnectionInfo, ProxyHandle, ReverseProxy};
use serde_json::Value;

mod common;

fn client_conn() -> ConnectionInfo {
    ConnectionInfo::plain("127.0.0.1:45000".parse().unwrap())
}

async fn send(proxy: &ReverseProxy, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = proxy.serve(request, client_conn()).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, headers, body.to_vec())
}

async fn echo(proxy: &ReverseProxy, request: Request<Body>) -> Value {
    let (status, _, body) = send(proxy, request).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_hop_by_hop_request_headers_are_stripped() {
    let backend = common::start_echo_backend("b1").await;
    let proxy = ReverseProxy::builder().target(backend.to_string()).build().unwrap();

    let request = Request::builder()
        .uri("/headers")
        .header("Connection", "keep-alive")
        .header("Proxy-Connection", "keep-alive")
        .header("Keep-Alive", "timeout=5")
        .header("Proxy-Authenticate", "Basic")
        .header("Proxy-Authorization", "Basic Zm9vOmJhcg==")
        .header("TE", "trailers")
        .header("Trailer", "Expires")
        .header("Upgrade", "h2c")
        .header("X-Request-Tag", "kept")
        .body(Body::empty())
        .unwrap();

    let seen = echo(&proxy, request).await;
    let headers = seen["headers"].as_object().unwrap();
    for name in [
        "connection",
        "proxy-connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "upgrade",
    ] {
        assert!(!headers.contains_key(name), "{name} reached the upstream");
    }
    assert_eq!(headers["x-request-tag"], "kept");
    assert_eq!(seen["version"], "HTTP/1.1");
}

#[tokio::test]
async fn test_hop_by_hop_response_headers_are_stripped() {
    let backend = common::start_raw_backend(
        "HTTP/1.1 200 OK\r\n\
         Content-Length: 2\r\n\
         Connection: close\r\n\
         Keep-Alive: timeout=5\r\n\
         Proxy-Authenticate: Basic\r\n\
         Trailer: Expires\r\n\
         Upgrade: h2c\r\n\
         X-Custom: kept\r\n\
         \r\n\
         ok"
            .to_string(),
    )
    .await;
    let proxy = ReverseProxy::builder().target(backend.to_string()).build().unwrap();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&proxy, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    assert_eq!(headers.get("x-custom").unwrap(), "kept");
    for name in ["connection", "keep-alive", "proxy-authenticate", "trailer", "upgrade"] {
        assert!(headers.get(name).is_none(), "{name} reached the client");
    }
}

#[tokio::test]
async fn test_forwarded_for_and_virtual_host() {
    let backend = common::start_echo_backend("b1").await;
    let proxy = ReverseProxy::builder().target(backend.to_string()).build().unwrap();

    let request = Request::builder()
        .uri("/")
        .header("Host", "public.example")
        .header("X-Forwarded-For", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    let seen = echo(&proxy, request).await;

    assert_eq!(seen["headers"]["x-forwarded-for"], "203.0.113.7, 127.0.0.1");
    assert_eq!(seen["headers"]["host"], backend.to_string());
}

#[tokio::test]
async fn test_disabled_virtual_host_keeps_inbound_host() {
    let backend = common::start_echo_backend("b1").await;
    let proxy = ReverseProxy::builder()
        .target(backend.to_string())
        .disable_virtual_host()
        .build()
        .unwrap();

    let request = Request::builder()
        .uri("/")
        .header("Host", "public.example")
        .body(Body::empty())
        .unwrap();
    let seen = echo(&proxy, request).await;
    assert_eq!(seen["headers"]["host"], "public.example");
}

#[tokio::test]
async fn test_path_normalization() {
    let backend = common::start_echo_backend("b1").await;

    let normalizing = ReverseProxy::builder().target(backend.to_string()).build().unwrap();
    let request = Request::builder().uri("/a//b/./c/../d?x=1&y=2").body(Body::empty()).unwrap();
    let seen = echo(&normalizing, request).await;
    assert_eq!(seen["path"], "/a/b/d");
    assert_eq!(seen["query"], "x=1&y=2");

    let verbatim = ReverseProxy::builder()
        .target(backend.to_string())
        .disable_path_normalizing()
        .build()
        .unwrap();
    let request = Request::builder().uri("/a//b?x=1").body(Body::empty()).unwrap();
    let seen = echo(&verbatim, request).await;
    assert_eq!(seen["path"], "/a//b");
}

#[tokio::test]
async fn test_request_body_and_method_are_forwarded() {
    let backend = common::start_echo_backend("b1").await;
    let proxy = ReverseProxy::builder().target(backend.to_string()).build().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header("Content-Type", "text/plain")
        .body(Body::from("payload"))
        .unwrap();
    let seen = echo(&proxy, request).await;
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["headers"]["content-length"], "7");
}

#[tokio::test]
async fn test_timeout_yields_408() {
    let backend = common::start_delayed_raw_backend(
        "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nslow".to_string(),
        Duration::from_secs(2),
    )
    .await;
    let proxy = ReverseProxy::builder()
        .target(backend.to_string())
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, _, body) = send(&proxy, request).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(String::from_utf8_lossy(&body).contains("timeout"));
}

#[tokio::test]
async fn test_unreachable_upstream_yields_500() {
    // Bind then drop to get a port nobody listens on.
    let addr: SocketAddr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = ReverseProxy::builder().target(addr.to_string()).build().unwrap();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, _, body) = send(&proxy, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.is_empty());
}

#[tokio::test]
async fn test_balanced_requests_follow_weights() {
    let b1 = common::start_echo_backend("b1").await;
    let b2 = common::start_echo_backend("b2").await;
    let proxy = ReverseProxy::builder()
        .balancer([(b1.to_string(), 2), (b2.to_string(), 1)])
        .build()
        .unwrap();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..6 {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let seen = echo(&proxy, request).await;
        *counts.entry(seen["backend"].as_str().unwrap().to_string()).or_default() += 1;
    }
    assert_eq!(counts["b1"], 4);
    assert_eq!(counts["b2"], 2);
}

#[tokio::test]
async fn test_rebound_engine_reaches_new_upstream() {
    use relay_proxy::Recyclable;

    let b1 = common::start_echo_backend("b1").await;
    let b2 = common::start_echo_backend("b2").await;
    let mut proxy = ReverseProxy::builder().target(b1.to_string()).build().unwrap();

    proxy.rebind(&b2.to_string());
    let seen = echo(&proxy, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(seen["backend"], "b2");

    proxy.reset();
    let (status, _, _) = send(&proxy, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

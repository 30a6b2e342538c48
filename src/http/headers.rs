//! Header manipulation shared by the HTTP and WebSocket engines.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Maintain X-Forwarded-For / X-Forwarded-Proto
//! - Normalize request paths before forwarding
//!
//! # Design Decisions
//! - Header names are matched case-insensitively (HeaderName is lowercase)
//! - Prior X-Forwarded-For values are folded into one comma-separated value

use std::borrow::Cow;
use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const OVERRIDE_PATH: HeaderName = HeaderName::from_static("override-path");

/// Headers meaningful for a single transport hop only.
pub const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove every hop-by-hop header.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Value for X-Forwarded-For with `client` appended to any prior entries.
pub fn forwarded_for(headers: &HeaderMap, client: IpAddr) -> Option<HeaderValue> {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let value = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client)
    };
    HeaderValue::from_str(&value).ok()
}

/// Append `client` to the request's X-Forwarded-For header.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    if let Some(value) = forwarded_for(headers, client) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Value for X-Forwarded-Proto.
pub fn forwarded_proto(tls: bool) -> HeaderValue {
    HeaderValue::from_static(if tls { "https" } else { "http" })
}

/// Normalize a request path: collapse repeated slashes, drop `.` segments
/// and resolve `..` without climbing above the root.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let needs_work = path.is_empty()
        || !path.starts_with('/')
        || path.contains("//")
        || path.split('/').any(|seg| seg == "." || seg == "..");
    if !needs_work {
        return Cow::Borrowed(path);
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut out = String::with_capacity(path.len());
    for seg in &segments {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() || trailing {
        out.push('/');
    }
    Cow::Owned(out)
}

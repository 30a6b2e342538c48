//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, upstream, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_websocket_sessions_total` (counter): WebSocket sessions by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a cheap no-op
//! - Labels are route names and upstream addresses, never request paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed HTTP request.
pub fn record_request(route: &str, upstream: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "upstream" => upstream.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    ::metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// How a WebSocket session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Backend dial failed; the client got an HTTP error response.
    DialFailed,
    /// The client was rejected before dialing (origin check, not an upgrade).
    Rejected,
    /// Both sides were relayed and the session ended with a normal close.
    Closed,
    /// The session ended on an abnormal close or a transport error.
    Aborted,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::DialFailed => "dial_failed",
            SessionOutcome::Rejected => "rejected",
            SessionOutcome::Closed => "closed",
            SessionOutcome::Aborted => "aborted",
        }
    }
}

/// Record the end of one WebSocket session.
pub fn record_websocket_session(outcome: SessionOutcome) {
    ::metrics::counter!("proxy_websocket_sessions_total", "outcome" => outcome.as_str()).increment(1);
}

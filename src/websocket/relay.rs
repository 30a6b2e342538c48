//! Duplex frame relay between an upgraded client and its backend.
//!
//! # Data Flow
//! ```text
//!            ┌──────── client → backend task ────────┐
//! client ws ─┤                                       ├─ backend ws
//!            └──────── backend → client task ────────┘
//!                         │ RelayEnd
//!                         ▼
//!                    coordinator (first report ends the session)
//! ```
//!
//! # Design Decisions
//! - Each direction owns one read half and the opposite write half
//! - A structured close is forwarded with its code and reason; a close
//!   without status is forwarded as 1000
//! - EOF and read errors are abnormal (1006). 1006 may not appear in a close
//!   frame, so the destination is torn down without a closing handshake,
//!   which is exactly how its peer observes 1006
//! - After a structured close the companion task gets a short grace period
//!   to finish the closing handshake; otherwise it is aborted at once

use std::fmt::Display;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{self, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, protocol::CloseFrame};

use crate::observability::metrics::{self, SessionOutcome};
use crate::websocket::options::BackendStream;

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when a side went away without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Largest close reason that fits in a control frame.
pub const MAX_CLOSE_REASON: usize = 123;

/// How long the companion direction may keep running after a close.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Direction of one relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::ClientToBackend => "client->backend",
            Direction::BackendToClient => "backend->client",
        }
    }
}

/// Why a relay direction stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// The source sent a close frame (absent status reported as 1000).
    Closed { code: u16, reason: String },
    /// The source stream ended without a close frame.
    Eof,
    /// Reading from the source failed.
    Read(String),
    /// Writing to the destination failed.
    Write(String),
}

impl RelayEnd {
    /// Close code this end translates to.
    pub fn code(&self) -> u16 {
        match self {
            RelayEnd::Closed { code, .. } => *code,
            _ => CLOSE_ABNORMAL,
        }
    }

    /// A structured close, the expected way for a session to end.
    pub fn is_close(&self) -> bool {
        matches!(self, RelayEnd::Closed { .. })
    }

    /// Close frame to forward to the destination, if any may be sent.
    pub fn forward_frame(&self) -> Option<(u16, String)> {
        match self {
            RelayEnd::Closed { code, reason } if sendable(*code) => {
                Some((*code, truncate_reason(reason).to_string()))
            }
            _ => None,
        }
    }
}

/// Codes reserved for local reporting that must never be sent on the wire.
fn sendable(code: u16) -> bool {
    !matches!(code, 1005 | 1006 | 1015)
}

/// Truncate `reason` to the control-frame limit on a char boundary.
pub fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Frame content common to both WebSocket libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<(u16, String)>),
}

/// A message type the relay can read and write.
trait Relayed: Sized {
    fn into_frame(self) -> Option<Frame>;
    fn from_frame(frame: Frame) -> Self;
}

impl Relayed for ws::Message {
    fn into_frame(self) -> Option<Frame> {
        Some(match self {
            ws::Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            ws::Message::Binary(data) => Frame::Binary(data),
            ws::Message::Ping(data) => Frame::Ping(data),
            ws::Message::Pong(data) => Frame::Pong(data),
            ws::Message::Close(close) => {
                Frame::Close(close.map(|c| (c.code, c.reason.as_str().to_owned())))
            }
        })
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => ws::Message::Text(text.into()),
            Frame::Binary(data) => ws::Message::Binary(data),
            Frame::Ping(data) => ws::Message::Ping(data),
            Frame::Pong(data) => ws::Message::Pong(data),
            Frame::Close(close) => ws::Message::Close(close.map(|(code, reason)| ws::CloseFrame {
                code,
                reason: reason.into(),
            })),
        }
    }
}

impl Relayed for tungstenite::Message {
    fn into_frame(self) -> Option<Frame> {
        Some(match self {
            tungstenite::Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            tungstenite::Message::Binary(data) => Frame::Binary(data),
            tungstenite::Message::Ping(data) => Frame::Ping(data),
            tungstenite::Message::Pong(data) => Frame::Pong(data),
            tungstenite::Message::Close(close) => {
                Frame::Close(close.map(|c| (u16::from(c.code), c.reason.as_str().to_owned())))
            }
            // Raw frames only surface when writing; never relayed.
            tungstenite::Message::Frame(_) => return None,
        })
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => tungstenite::Message::Text(text.into()),
            Frame::Binary(data) => tungstenite::Message::Binary(data),
            Frame::Ping(data) => tungstenite::Message::Ping(data),
            Frame::Pong(data) => tungstenite::Message::Pong(data),
            Frame::Close(close) => tungstenite::Message::Close(close.map(|(code, reason)| CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        }
    }
}

/// Copy frames from `source` to `sink` until either side stops.
async fn pump<S, K, In, Out, E>(mut source: S, mut sink: K) -> RelayEnd
where
    S: Stream<Item = Result<In, E>> + Unpin,
    E: Display,
    In: Relayed,
    K: Sink<Out> + Unpin,
    K::Error: Display,
    Out: Relayed,
{
    let end = loop {
        let frame = match source.next().await {
            None => break RelayEnd::Eof,
            Some(Err(e)) => break RelayEnd::Read(e.to_string()),
            Some(Ok(message)) => match message.into_frame() {
                Some(frame) => frame,
                None => continue,
            },
        };

        if let Frame::Close(close) = frame {
            let (code, reason) = close.unwrap_or((CLOSE_NORMAL, String::new()));
            break RelayEnd::Closed { code, reason };
        }

        if let Err(e) = sink.send(Out::from_frame(frame)).await {
            return RelayEnd::Write(e.to_string());
        }
    };

    if let Some(close) = end.forward_frame() {
        // The destination may already be closing; nothing left to report.
        let _ = sink.send(Out::from_frame(Frame::Close(Some(close)))).await;
    }
    end
}

/// Identity of a relayed session, for logs.
#[derive(Debug, Clone)]
pub struct Session {
    pub proxy: String,
    pub backend: String,
    pub debug: bool,
}

/// Relay frames between `client` and `backend` until the session ends.
pub async fn run(client: WebSocket, backend: BackendStream, session: Session) {
    let (client_sink, client_source) = client.split();
    let (backend_sink, backend_source) = backend.split();
    let (tx, mut rx) = mpsc::channel::<(Direction, RelayEnd)>(2);

    let upstream_tx = tx.clone();
    let upstream = tokio::spawn(async move {
        let end = pump::<_, _, ws::Message, tungstenite::Message, _>(client_source, backend_sink).await;
        let _ = upstream_tx.send((Direction::ClientToBackend, end)).await;
    });
    let downstream = tokio::spawn(async move {
        let end = pump::<_, _, tungstenite::Message, ws::Message, _>(backend_source, client_sink).await;
        let _ = tx.send((Direction::BackendToClient, end)).await;
    });

    let Some((direction, end)) = rx.recv().await else {
        return;
    };
    report(&session, direction, &end);

    if end.is_close() {
        if let Ok(Some((direction, end))) = tokio::time::timeout(CLOSE_GRACE, rx.recv()).await {
            if session.debug {
                tracing::debug!(
                    proxy = %session.proxy,
                    direction = direction.as_str(),
                    end = ?end,
                    "Companion relay finished"
                );
            }
        }
    }

    upstream.abort();
    downstream.abort();

    metrics::record_websocket_session(if end.is_close() {
        SessionOutcome::Closed
    } else {
        SessionOutcome::Aborted
    });
}

fn report(session: &Session, direction: Direction, end: &RelayEnd) {
    match end {
        RelayEnd::Closed {
            code: CLOSE_NORMAL, ..
        } => {
            if session.debug {
                tracing::debug!(
                    proxy = %session.proxy,
                    backend = %session.backend,
                    direction = direction.as_str(),
                    "WebSocket session closed normally"
                );
            }
        }
        RelayEnd::Closed { code, reason } => {
            tracing::info!(
                proxy = %session.proxy,
                backend = %session.backend,
                direction = direction.as_str(),
                code,
                reason = %reason,
                "WebSocket session closed"
            );
        }
        other => {
            tracing::warn!(
                proxy = %session.proxy,
                backend = %session.backend,
                direction = direction.as_str(),
                code = other.code(),
                end = ?other,
                "WebSocket session ended abnormally"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_reason() {
        assert_eq!(truncate_reason("bye"), "bye");
        let long = "x".repeat(200);
        assert_eq!(truncate_reason(&long).len(), MAX_CLOSE_REASON);

        // 'é' is two bytes; the cut must not split it.
        let accented = "é".repeat(100);
        let cut = truncate_reason(&accented);
        assert!(cut.len() <= MAX_CLOSE_REASON);
        assert_eq!(cut.len() % 2, 0);
    }

    #[test]
    fn test_forward_frame() {
        let closed = RelayEnd::Closed {
            code: 4001,
            reason: "custom".into(),
        };
        assert_eq!(closed.forward_frame(), Some((4001, "custom".into())));
        assert_eq!(closed.code(), 4001);
        assert!(closed.is_close());

        assert_eq!(RelayEnd::Eof.forward_frame(), None);
        assert_eq!(RelayEnd::Eof.code(), CLOSE_ABNORMAL);
        assert_eq!(RelayEnd::Read("reset".into()).code(), CLOSE_ABNORMAL);
        assert!(!RelayEnd::Write("broken pipe".into()).is_close());
    }

    #[test]
    fn test_reserved_codes_are_not_forwarded() {
        for code in [1005, 1006, 1015] {
            let end = RelayEnd::Closed {
                code,
                reason: String::new(),
            };
            assert_eq!(end.forward_frame(), None);
        }
    }

    #[test]
    fn test_message_conversion() {
        let text = tungstenite::Message::Text("hello".into());
        let frame = text.into_frame().unwrap();
        assert_eq!(frame, Frame::Text("hello".into()));
        assert!(matches!(ws::Message::from_frame(frame), ws::Message::Text(t) if t.as_str() == "hello"));

        let close = ws::Message::Close(Some(ws::CloseFrame {
            code: 1001,
            reason: "going away".into(),
        }));
        let frame = close.into_frame().unwrap();
        match tungstenite::Message::from_frame(frame) {
            tungstenite::Message::Close(Some(c)) => {
                assert_eq!(u16::from(c.code), 1001);
                assert_eq!(c.reason.as_str(), "going away");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pump_translates_close_without_status() {
        let source = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>(tungstenite::Message::Binary(Bytes::from_static(b"\x01\x02"))),
            Ok(tungstenite::Message::Close(None)),
        ]);
        let mut received: Vec<ws::Message> = Vec::new();

        let end = pump::<_, _, tungstenite::Message, ws::Message, _>(source, &mut received).await;
        assert_eq!(
            end,
            RelayEnd::Closed {
                code: CLOSE_NORMAL,
                reason: String::new()
            }
        );

        assert_eq!(received.len(), 2);
        assert!(matches!(&received[0], ws::Message::Binary(b) if &b[..] == b"\x01\x02"));
        assert!(matches!(&received[1], ws::Message::Close(Some(c)) if c.code == CLOSE_NORMAL));
    }

    #[tokio::test]
    async fn test_pump_eof_sends_no_close() {
        let source = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(tungstenite::Message::Text(
            "last".into(),
        ))]);
        let mut received: Vec<ws::Message> = Vec::new();

        let end = pump::<_, _, tungstenite::Message, ws::Message, _>(source, &mut received).await;
        assert_eq!(end, RelayEnd::Eof);
        assert_eq!(received.len(), 1);
    }
}

//! services/api/src/streaming/transport.rs
//!
//! Server-Sent Events framing for advice sessions.
//!
//! A session writes `StreamEvent`s into an `EventSink`; the matching
//! `EventSource` is handed to axum as the response body. Each event is
//! written as one `data: {json}\n\n` frame, and a `: heartbeat\n\n` comment
//! frame is written whenever the stream has been quiet for the heartbeat
//! interval. When the peer goes away axum drops the body, which drops the
//! source and cancels the session's disconnect token.

use axum::{
    http::{header::HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use sleep_advice_core::protocol::StreamEvent;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::error;

/// How many events a session may run ahead of a slow client.
pub const EVENT_BUFFER: usize = 32;

/// Comment text carried by heartbeat frames.
pub const HEARTBEAT_COMMENT: &str = "heartbeat";

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Raised when the client is no longer there to receive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the client disconnected")]
pub struct Disconnected;

/// Creates a connected sink/source pair.
///
/// `disconnect` is cancelled as soon as the source is dropped. Passing a
/// child of the server's shutdown token also ends the session on shutdown.
pub fn channel(disconnect: CancellationToken) -> (EventSink, EventSource) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let guard = disconnect.clone().drop_guard();
    (
        EventSink { tx, disconnect },
        EventSource {
            rx,
            _guard: guard,
        },
    )
}

//=========================================================================================
// Session Side
//=========================================================================================

/// The writing half used by an advice session.
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    disconnect: CancellationToken,
}

impl EventSink {
    /// Queues one event for the client, in order.
    pub async fn send(&self, event: StreamEvent) -> Result<(), Disconnected> {
        tokio::select! {
            biased;
            _ = self.disconnect.cancelled() => Err(Disconnected),
            sent = self.tx.send(event) => sent.map_err(|_| Disconnected),
        }
    }

    /// Resolves once the client has gone away.
    pub async fn disconnected(&self) {
        tokio::select! {
            _ = self.disconnect.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnect.is_cancelled() || self.tx.is_closed()
    }
}

//=========================================================================================
// Response Side
//=========================================================================================

/// The reading half, consumed as the response body.
pub struct EventSource {
    rx: mpsc::Receiver<StreamEvent>,
    _guard: DropGuard,
}

impl Stream for EventSource {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Encodes one event as an SSE `data:` frame.
pub fn encode_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            error!("Failed to serialize a stream event: {}", e);
            Event::default().data(r#"{"type":"error","message":"failed to encode event"}"#)
        }
    }
}

/// Turns a source into a `text/event-stream` response with heartbeats.
pub fn sse_response(source: EventSource, heartbeat: Duration) -> Response {
    use futures::StreamExt;

    let frames = source.map(|event| Ok::<_, Infallible>(encode_event(&event)));
    let sse = Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(heartbeat)
            .text(HEARTBEAT_COMMENT),
    );

    // Stops reverse proxies such as nginx from holding frames back.
    ([(X_ACCEL_BUFFERING, HeaderValue::from_static("no"))], sse).into_response()
}

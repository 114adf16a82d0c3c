//! services/api/src/streaming/session.rs
//!
//! Drives a single advice request from start to its terminal event.
//!
//! A session emits `Start` before touching the upstream, forwards every
//! fragment as a `Chunk` carrying the accumulated text, and finishes with
//! exactly one `Complete` or `Error`. It stops pulling from the upstream as
//! soon as the client disconnects or the session deadline passes.

use crate::streaming::{
    transport::{Disconnected, EventSink},
    upstream::{UpstreamItem, UpstreamTextStream},
};
use sleep_advice_core::protocol::StreamEvent;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Status line sent with the `Start` event.
pub const START_MESSAGE: &str = "AI가 수면 데이터를 분석하고 있습니다...";

/// Message sent when the session deadline passes before the upstream finishes.
pub const TIMEOUT_MESSAGE: &str = "AI 조언 생성 시간이 초과되었습니다. 잠시 후 다시 시도해주세요.";

/// How long the timeout frame may wait for room in a full event buffer.
pub const TERMINAL_FRAME_GRACE: Duration = Duration::from_secs(1);

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `Complete` was delivered.
    Completed,
    /// The upstream failed and `Error` was delivered.
    Failed,
    /// The deadline passed and `Error` was delivered.
    TimedOut,
    /// The client went away; nothing more was delivered.
    Disconnected,
}

impl From<Disconnected> for SessionOutcome {
    fn from(_: Disconnected) -> Self {
        Self::Disconnected
    }
}

/// One client's advice stream.
pub struct AdviceStreamSession {
    id: Uuid,
    user_id: i64,
    upstream: UpstreamTextStream,
    sink: EventSink,
    timeout: Duration,
    full_text: String,
    fragments: usize,
}

impl AdviceStreamSession {
    pub fn new(user_id: i64, upstream: UpstreamTextStream, sink: EventSink, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            upstream,
            sink,
            timeout,
            full_text: String::new(),
            fragments: 0,
        }
    }

    /// Runs the session to completion.
    ///
    /// The sink is dropped on return, which closes the response.
    pub async fn run(mut self) -> SessionOutcome {
        let started = Instant::now();
        info!(session_id = %self.id, user_id = self.user_id, "Advice session opened.");

        let outcome = match tokio::time::timeout_at(started + self.timeout, self.stream()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.upstream.release();
                warn!(
                    session_id = %self.id,
                    timeout_secs = self.timeout.as_secs(),
                    "Advice session timed out."
                );
                // A peer that stopped reading must not keep the session alive.
                let timeout_frame = self.sink.send(StreamEvent::error(TIMEOUT_MESSAGE));
                match tokio::time::timeout(TERMINAL_FRAME_GRACE, timeout_frame).await {
                    Ok(Ok(())) => SessionOutcome::TimedOut,
                    Ok(Err(e)) => e.into(),
                    Err(_) => {
                        warn!(session_id = %self.id, "Timeout frame could not be queued; closing anyway.");
                        SessionOutcome::TimedOut
                    }
                }
            }
        };
        self.upstream.release();

        info!(
            session_id = %self.id,
            user_id = self.user_id,
            outcome = ?outcome,
            fragments = self.fragments,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Advice session closed."
        );
        outcome
    }

    async fn stream(&mut self) -> SessionOutcome {
        if let Err(e) = self.sink.send(StreamEvent::start(START_MESSAGE)).await {
            return e.into();
        }

        loop {
            let item = tokio::select! {
                biased;
                _ = self.sink.disconnected() => return SessionOutcome::Disconnected,
                item = self.upstream.pull() => item,
            };

            let (event, outcome) = match item {
                Some(UpstreamItem::Fragment(text)) => {
                    self.full_text.push_str(&text);
                    self.fragments += 1;
                    if let Err(e) = self.sink.send(StreamEvent::chunk(text, self.full_text.clone())).await {
                        return e.into();
                    }
                    continue;
                }
                Some(UpstreamItem::Finished) | None => (
                    StreamEvent::complete(self.full_text.clone()),
                    SessionOutcome::Completed,
                ),
                Some(UpstreamItem::Failed(message)) => {
                    warn!(session_id = %self.id, "Advice generation failed: {}", message);
                    (StreamEvent::error(message), SessionOutcome::Failed)
                }
            };

            return match self.sink.send(event).await {
                Ok(()) => outcome,
                Err(e) => e.into(),
            };
        }
    }
}

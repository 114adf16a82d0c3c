//! crates/advice_client/src/frame.rs
//!
//! Turns the raw body of an advice response into typed stream events.
//!
//! SSE framing is handled by `eventsource-stream`: chunks may end anywhere,
//! including inside a multi-byte character, and comment lines such as the
//! server's heartbeats never surface as events. Each event's `data` is then
//! decoded as a `StreamEvent`. Frames that are not valid JSON are logged and
//! skipped so one bad frame does not end the stream.

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use sleep_advice_core::protocol::StreamEvent;
use tracing::warn;

/// Decodes a byte stream of SSE frames into advice events, in arrival order.
///
/// Transport failures and broken UTF-8 are passed through as errors.
pub fn decode_events<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<StreamEvent, EventStreamError<E>>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    bytes.eventsource().filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::from_str::<StreamEvent>(&event.data) {
                Ok(parsed) => Some(Ok(parsed)),
                Err(e) => {
                    warn!("Dropping malformed advice frame: {}", e);
                    None
                }
            },
            Err(e) => Some(Err(e)),
        }
    })
}

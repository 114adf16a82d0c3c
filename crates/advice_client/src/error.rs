//! crates/advice_client/src/error.rs

use eventsource_stream::EventStreamError;

/// Failures of one advice request, outside of the stream's own `error` events.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("The server answered {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered with a `{success: false}` envelope.
    #[error("The request was rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The event stream broke off or was not valid SSE.
    #[error("Event stream error: {0}")]
    Stream(#[from] EventStreamError<reqwest::Error>),

    /// The stream ended without a `complete` or `error` event.
    #[error("The connection closed before the advice was complete")]
    Closed,
}

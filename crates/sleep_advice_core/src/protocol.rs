//! crates/sleep_advice_core/src/protocol.rs
//!
//! Defines the JSON payloads exchanged between the advice endpoint and its
//! consumers: the events framed onto the SSE stream and the ordinary response
//! envelope used by every non-streaming answer.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Streaming Events
//=========================================================================================

/// One event of an advice stream.
///
/// A stream carries exactly one `Start`, then any number of `Chunk`s, then
/// exactly one terminal event (`Complete` or `Error`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// Sent before any upstream work begins.
    Start { message: String },

    /// One generated fragment. `full_text` is everything generated so far and,
    /// when present, takes precedence over `text` on the consumer side.
    Chunk {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_text: Option<String>,
        #[serde(default)]
        is_complete: bool,
    },

    /// Generation finished; `full_text` is the final advice.
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_text: Option<String>,
    },

    /// The stream failed and is closing.
    Error { message: String },
}

impl StreamEvent {
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start {
            message: message.into(),
        }
    }

    /// A chunk carrying both the new fragment and the accumulated text.
    pub fn chunk(text: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self::Chunk {
            text: text.into(),
            full_text: Some(full_text.into()),
            is_complete: false,
        }
    }

    pub fn complete(full_text: impl Into<String>) -> Self {
        Self::Complete {
            full_text: Some(full_text.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The envelope wrapping every ordinary JSON response of the API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

/// Payload of a non-streaming advice answer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdviceBody {
    pub advice: String,
}

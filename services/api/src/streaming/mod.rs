//! services/api/src/streaming/mod.rs
//!
//! The streaming pipeline behind the advice endpoint: the upstream text
//! stream, the per-request session, and the SSE transport.

pub mod session;
pub mod transport;
pub mod upstream;

pub use session::{AdviceStreamSession, SessionOutcome, START_MESSAGE, TIMEOUT_MESSAGE};
pub use transport::{channel, sse_response, Disconnected, EventSink, EventSource};
pub use upstream::{UpstreamItem, UpstreamTextStream};

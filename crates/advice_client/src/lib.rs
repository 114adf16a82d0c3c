//! Client for the streamed sleep-advice endpoint.
//!
//! `AdviceConsumer` opens the event stream, `decode_events` turns it into
//! typed events, and `AdviceView` is the text and status a user interface renders.

pub mod consumer;
pub mod error;
pub mod frame;
pub mod view;

pub use consumer::{AdviceConsumer, ConsumerConfig, TIMEOUT_MESSAGE};
pub use error::ClientError;
pub use frame::decode_events;
pub use view::{AdviceView, Flow, Phase};

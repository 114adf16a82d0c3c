//! crates/advice_client/src/view.rs
//!
//! What a user interface shows for the advice request in flight.

use sleep_advice_core::protocol::StreamEvent;

/// Where the current advice request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// The request is sent but the stream has not started.
    Loading,
    Streaming,
    Completed,
    Failed,
    /// The user cancelled the request.
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Whether the stream should keep being read after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

/// Rendered state of one advice request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdviceView {
    pub phase: Phase,
    /// Status line from the `start` event.
    pub status: Option<String>,
    /// Advice text shown so far.
    pub text: String,
    pub error: Option<String>,
    /// Whether a loading indicator should be shown.
    pub loading: bool,
}

impl AdviceView {
    /// The state right after a request has been issued.
    pub fn loading() -> Self {
        Self {
            phase: Phase::Loading,
            loading: true,
            ..Self::default()
        }
    }

    /// Applies one decoded event. Events arriving after a terminal state are ignored.
    pub fn apply(&mut self, event: StreamEvent) -> Flow {
        if self.phase.is_terminal() {
            return Flow::Finished;
        }

        match event {
            StreamEvent::Start { message } => {
                self.phase = Phase::Streaming;
                self.status = Some(message);
                self.text.clear();
                self.error = None;
                self.loading = true;
                Flow::Continue
            }
            StreamEvent::Chunk {
                text, full_text, ..
            } => {
                // Every chunk carrying the accumulated text is self-sufficient.
                match full_text {
                    Some(full_text) => self.text = full_text,
                    None => self.text.push_str(&text),
                }
                self.phase = Phase::Streaming;
                Flow::Continue
            }
            StreamEvent::Complete { full_text } => {
                if let Some(full_text) = full_text {
                    self.text = full_text;
                }
                self.finish(Phase::Completed);
                Flow::Finished
            }
            StreamEvent::Error { message } => {
                self.error = Some(message);
                self.finish(Phase::Failed);
                Flow::Finished
            }
        }
    }

    /// Shows a complete advice text received without streaming.
    pub fn complete_with(&mut self, advice: String) {
        self.text = advice;
        self.finish(Phase::Completed);
    }

    /// Surfaces a failure that did not come from the stream itself.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.phase.is_terminal() {
            self.error = Some(message.into());
            self.finish(Phase::Failed);
        }
    }

    /// Marks the request as cancelled by the user. This is not an error.
    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            self.finish(Phase::Cancelled);
        }
    }

    fn finish(&mut self, phase: Phase) {
        self.phase = phase;
        self.loading = false;
    }
}

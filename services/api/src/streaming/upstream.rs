//! services/api/src/streaming/upstream.rs
//!
//! A pull-based view over one call to the generation provider.
//!
//! The call is opened lazily on the first pull, so a session can report its
//! start to the client before any upstream I/O happens. Every pull yields one
//! item, and the sequence always ends with exactly one terminal item
//! (`Finished` or `Failed`), after which `pull` returns `None`.

use futures::StreamExt;
use sleep_advice_core::ports::{AdviceGenerationService, FragmentStream, GenerationOptions};
use std::sync::Arc;
use tracing::{debug, warn};

/// One step of an upstream generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamItem {
    /// A non-empty piece of generated text.
    Fragment(String),
    /// The provider signalled completion.
    Finished,
    /// The provider failed; carries a human-readable description.
    Failed(String),
}

impl UpstreamItem {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

enum State {
    Pending {
        generator: Arc<dyn AdviceGenerationService>,
        prompt: String,
        options: GenerationOptions,
    },
    Streaming(FragmentStream),
    Done,
}

/// The upstream text stream of a single advice session.
pub struct UpstreamTextStream {
    state: State,
}

impl UpstreamTextStream {
    pub fn new(
        generator: Arc<dyn AdviceGenerationService>,
        prompt: String,
        options: GenerationOptions,
    ) -> Self {
        Self {
            state: State::Pending {
                generator,
                prompt,
                options,
            },
        }
    }

    /// Waits for the next item.
    ///
    /// Dropping the returned future before it resolves releases the
    /// upstream call; later pulls then return `None`.
    pub async fn pull(&mut self) -> Option<UpstreamItem> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::Pending {
                    generator,
                    prompt,
                    options,
                } => match generator.stream_advice(&prompt, options).await {
                    Ok(fragments) => {
                        debug!("Upstream generation opened.");
                        self.state = State::Streaming(fragments);
                    }
                    Err(e) => {
                        warn!("Upstream generation could not be opened: {}", e);
                        return Some(UpstreamItem::Failed(e.to_string()));
                    }
                },
                State::Streaming(mut fragments) => match fragments.next().await {
                    Some(Ok(text)) => {
                        self.state = State::Streaming(fragments);
                        if !text.is_empty() {
                            return Some(UpstreamItem::Fragment(text));
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Upstream generation failed mid-stream: {}", e);
                        return Some(UpstreamItem::Failed(e.to_string()));
                    }
                    None => return Some(UpstreamItem::Finished),
                },
            }
        }
    }

    /// Drops the upstream call, if one is open.
    pub fn release(&mut self) {
        self.state = State::Done;
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

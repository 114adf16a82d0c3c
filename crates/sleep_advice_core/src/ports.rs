//! crates/sleep_advice_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::domain::WeeklyStats;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    /// The text-generation provider failed (auth, quota, network, malformed response).
    #[error("Upstream generation failed: {0}")]
    Upstream(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An ordered stream of generated text fragments. The stream ending is the
/// provider's completion signal.
pub type FragmentStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// Sampling parameters forwarded to the generation provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SleepStatsService: Send + Sync {
    /// Computes the trailing-window statistics for a user.
    async fn get_weekly_stats(&self, user_id: i64) -> PortResult<WeeklyStats>;
}

#[async_trait]
pub trait AdviceGenerationService: Send + Sync {
    /// Starts a generation call and returns its fragments as they arrive.
    async fn stream_advice(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<FragmentStream>;

    /// Generates the whole advice text in one response.
    async fn generate_advice(&self, prompt: &str, options: GenerationOptions) -> PortResult<String> {
        let mut fragments = self.stream_advice(prompt, options).await?;
        let mut advice = String::new();
        while let Some(fragment) = fragments.next().await {
            advice.push_str(&fragment?);
        }
        Ok(advice)
    }
}

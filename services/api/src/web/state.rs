//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use sleep_advice_core::ports::{AdviceGenerationService, GenerationOptions, SleepStatsService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<dyn SleepStatsService>,
    pub advice: Arc<dyn AdviceGenerationService>,
    pub settings: StreamSettings,
    /// Cancelled on server shutdown; every advice session listens to a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        stats: Arc<dyn SleepStatsService>,
        advice: Arc<dyn AdviceGenerationService>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            stats,
            advice,
            settings,
            shutdown: CancellationToken::new(),
        }
    }
}

//=========================================================================================
// StreamSettings
//=========================================================================================

/// Tunables applied to every advice stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    pub generation: GenerationOptions,
    pub session_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            session_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for StreamSettings {
    fn from(config: &Config) -> Self {
        Self {
            generation: config.generation,
            session_timeout: config.session_timeout,
            heartbeat_interval: config.heartbeat_interval,
        }
    }
}

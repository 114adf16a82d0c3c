pub mod advice;
pub mod rest;
pub mod state;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use advice::advice_handler;
pub use rest::{health_handler, weekly_stats_handler};
pub use state::{AppState, StreamSettings};

/// Builds the `/api` routes over the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sleep/advice", get(advice_handler))
        .route("/api/sleep/stats", get(weekly_stats_handler))
        .route("/api/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

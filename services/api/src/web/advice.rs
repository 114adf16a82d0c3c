//! services/api/src/web/advice.rs
//!
//! The advice endpoint. Loads the user's weekly statistics and either answers
//! with the "insufficient data" envelope or opens an advice stream.

use crate::streaming::{self, AdviceStreamSession, UpstreamTextStream};
use crate::web::{rest::failure, state::AppState};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use sleep_advice_core::{advice_prompt, AdviceBody, ApiResponse};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::IntoParams;

/// Advice returned instead of a stream when the past week has no records.
pub const INSUFFICIENT_DATA_MESSAGE: &str =
    "최근 7일간의 수면 기록이 없습니다. 수면 기록을 추가하면 AI 조언을 받을 수 있습니다.";

/// Query parameters shared by the per-user endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// The user whose sleep records are analysed.
    pub user_id: i64,
}

/// Stream sleep advice for a user.
///
/// Answers with `text/event-stream`. Every frame is `data: {json}` where the
/// JSON is one of `{"type":"start","message"}`, `{"type":"chunk","text","fullText"}`,
/// `{"type":"complete","fullText"}` or `{"type":"error","message"}`.
/// When the user has no records in the past week, an ordinary JSON envelope
/// is returned instead.
#[utoipa::path(
    get,
    path = "/api/sleep/advice",
    params(UserQuery),
    responses(
        (status = 200, description = "Advice stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Missing or invalid userId"),
        (status = 500, description = "Sleep statistics could not be loaded")
    ),
    tag = "Sleep Advice API"
)]
pub async fn advice_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Response {
    let user_id = match query {
        Ok(Query(query)) => query.user_id,
        Err(rejection) => {
            return failure(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let stats = match app_state.stats.get_weekly_stats(user_id).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Failed to load weekly stats for user {}: {}", user_id, e);
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load sleep statistics",
            );
        }
    };

    if stats.is_empty() {
        info!("No sleep records this week for user {}; skipping the stream.", user_id);
        let body = ApiResponse::ok(AdviceBody {
            advice: INSUFFICIENT_DATA_MESSAGE.to_string(),
        });
        return Json(body).into_response();
    }

    let settings = app_state.settings;
    let upstream = UpstreamTextStream::new(
        app_state.advice.clone(),
        advice_prompt(&stats),
        settings.generation,
    );
    let (sink, source) = streaming::channel(app_state.shutdown.child_token());
    let session = AdviceStreamSession::new(user_id, upstream, sink, settings.session_timeout);

    tokio::spawn(async move {
        session.run().await;
    });

    streaming::sse_response(source, settings.heartbeat_interval)
}

//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the plain JSON endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{advice::UserQuery, state::AppState};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use serde::Serialize;
use sleep_advice_core::{ApiResponse, DailySleep, WeeklyStats};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::advice::advice_handler,
        weekly_stats_handler,
        health_handler,
    ),
    components(
        schemas(WeeklyStatsResponse, DailySleepResponse, HealthResponse)
    ),
    tags(
        (name = "Sleep Advice API", description = "Weekly sleep statistics and streamed AI sleep advice.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Trailing-week statistics of one user.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStatsResponse {
    /// Average hours slept per recorded day, rounded to two decimals.
    daily_average: f64,
    /// One entry per day with records, newest first.
    series: Vec<DailySleepResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailySleepResponse {
    date: NaiveDate,
    duration_hours: f64,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

impl From<WeeklyStats> for WeeklyStatsResponse {
    fn from(stats: WeeklyStats) -> Self {
        Self {
            daily_average: stats.daily_average,
            series: stats.series.into_iter().map(DailySleepResponse::from).collect(),
        }
    }
}

impl From<DailySleep> for DailySleepResponse {
    fn from(day: DailySleep) -> Self {
        Self {
            date: day.date,
            duration_hours: day.duration_hours,
        }
    }
}

/// Builds a `{success: false, error}` response with the given status.
pub fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::failure(error))).into_response()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the trailing-week sleep statistics of a user.
///
/// The payload is wrapped in the `{success, data}` envelope.
#[utoipa::path(
    get,
    path = "/api/sleep/stats",
    params(UserQuery),
    responses(
        (status = 200, description = "Weekly statistics", body = WeeklyStatsResponse),
        (status = 400, description = "Missing or invalid userId"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sleep Advice API"
)]
pub async fn weekly_stats_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Response {
    let user_id = match query {
        Ok(Query(query)) => query.user_id,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match app_state.stats.get_weekly_stats(user_id).await {
        Ok(stats) => Json(ApiResponse::ok(WeeklyStatsResponse::from(stats))).into_response(),
        Err(e) => {
            error!("Failed to load weekly stats for user {}: {}", user_id, e);
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load sleep statistics",
            )
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    ),
    tag = "Sleep Advice API"
)]
pub async fn health_handler() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
    }))
}

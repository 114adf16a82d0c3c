//! End-to-end tests of the advice endpoint over the real router.

use advice_client::{AdviceConsumer, ConsumerConfig, Phase};
use api_lib::streaming::{START_MESSAGE, TIMEOUT_MESSAGE};
use api_lib::web::{advice::INSUFFICIENT_DATA_MESSAGE, router, AppState, StreamSettings};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use sleep_advice_core::ports::{
    AdviceGenerationService, FragmentStream, GenerationOptions, PortError, PortResult,
    SleepStatsService,
};
use sleep_advice_core::{DailySleep, StreamEvent, WeeklyStats};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

//=========================================================================================
// Fakes
//=========================================================================================

struct FixedStats(PortResult<WeeklyStats>);

#[async_trait]
impl SleepStatsService for FixedStats {
    async fn get_weekly_stats(&self, _user_id: i64) -> PortResult<WeeklyStats> {
        self.0.clone()
    }
}

/// Plays back a script, optionally waiting before each fragment, and records the prompt.
#[derive(Default)]
struct ScriptedAdvice {
    steps: Vec<(Duration, PortResult<String>)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAdvice {
    fn fragments(parts: &[&str]) -> Self {
        Self {
            steps: parts
                .iter()
                .map(|p| (Duration::ZERO, Ok(p.to_string())))
                .collect(),
            ..Self::default()
        }
    }

    fn delayed(steps: Vec<(Duration, PortResult<String>)>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }
}

#[async_trait]
impl AdviceGenerationService for ScriptedAdvice {
    async fn stream_advice(
        &self,
        prompt: &str,
        _options: GenerationOptions,
    ) -> PortResult<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let steps = self.steps.clone();
        Ok(Box::pin(async_stream::stream! {
            for (delay, item) in steps {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield item;
            }
        }))
    }
}

struct Stalled;

#[async_trait]
impl AdviceGenerationService for Stalled {
    async fn stream_advice(&self, _: &str, _: GenerationOptions) -> PortResult<FragmentStream> {
        Ok(Box::pin(futures::stream::pending()))
    }
}

fn week() -> WeeklyStats {
    WeeklyStats::from_series(vec![
        DailySleep {
            date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            duration_hours: 7.5,
        },
        DailySleep {
            date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            duration_hours: 6.0,
        },
    ])
}

fn app(stats: PortResult<WeeklyStats>, advice: Arc<dyn AdviceGenerationService>) -> Router {
    let state = AppState::new(
        Arc::new(FixedStats(stats)),
        advice,
        StreamSettings::default(),
    );
    router(Arc::new(state))
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn get(app: Router, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

/// Splits an SSE body into its frames, keeping heartbeats as `None`.
fn frames(body: &str) -> Vec<Option<StreamEvent>> {
    body.split("\n\n")
        .filter(|block| !block.is_empty())
        .map(|block| {
            if block.starts_with(':') {
                assert_eq!(block, ": heartbeat");
                None
            } else {
                let json = block.strip_prefix("data: ").expect("a data frame");
                Some(serde_json::from_str(json).unwrap())
            }
        })
        .collect()
}

fn events(body: &str) -> Vec<StreamEvent> {
    frames(body).into_iter().flatten().collect()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn empty_week_returns_a_plain_json_envelope() {
    let advice = Arc::new(ScriptedAdvice::fragments(&["never"]));
    let (status, content_type, body) = get(
        app(Ok(WeeklyStats::default()), advice.clone()),
        "/api/sleep/advice?userId=1",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("application/json"));
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["advice"], INSUFFICIENT_DATA_MESSAGE);
    assert!(advice.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fragments_are_streamed_as_sse_frames() {
    let advice = Arc::new(ScriptedAdvice::fragments(&["안녕", "하세요"]));
    let (status, content_type, body) =
        get(app(Ok(week()), advice.clone()), "/api/sleep/advice?userId=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/event-stream");
    assert!(body.starts_with("data: {\"type\":\"start\""));
    assert!(body.contains("data: {\"type\":\"chunk\",\"text\":\"안녕\",\"fullText\":\"안녕\",\"isComplete\":false}\n\n"));
    assert_eq!(
        events(&body),
        vec![
            StreamEvent::start(START_MESSAGE),
            StreamEvent::chunk("안녕", "안녕"),
            StreamEvent::chunk("하세요", "안녕하세요"),
            StreamEvent::complete("안녕하세요"),
        ]
    );

    let prompts = advice.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("6.75"));
}

#[tokio::test]
async fn upstream_failure_is_reported_in_band() {
    let advice = Arc::new(ScriptedAdvice::delayed(vec![
        (Duration::ZERO, Ok("부분".to_string())),
        (
            Duration::ZERO,
            Err(PortError::Upstream("quota exceeded".to_string())),
        ),
    ]));
    let (status, _, body) = get(app(Ok(week()), advice), "/api/sleep/advice?userId=1").await;

    assert_eq!(status, StatusCode::OK);
    let events = events(&body);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[2], StreamEvent::Error { message } if message.contains("quota exceeded")));
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Complete { .. })));
}

#[tokio::test(start_paused = true)]
async fn quiet_streams_carry_heartbeats() {
    let advice = Arc::new(ScriptedAdvice::delayed(vec![(
        Duration::from_secs(65),
        Ok("늦은 조언".to_string()),
    )]));
    let (_, _, body) = get(app(Ok(week()), advice), "/api/sleep/advice?userId=1").await;

    let frames = frames(&body);
    assert!(matches!(frames[0], Some(StreamEvent::Start { .. })));
    assert_eq!(frames[1], None);
    assert_eq!(frames[2], None);
    assert_eq!(frames[3], Some(StreamEvent::chunk("늦은 조언", "늦은 조언")));
    assert_eq!(frames[4], Some(StreamEvent::complete("늦은 조언")));
    assert_eq!(frames.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_times_out_with_an_error_frame() {
    let (_, _, body) = get(app(Ok(week()), Arc::new(Stalled)), "/api/sleep/advice?userId=1").await;

    let events = events(&body);
    assert_eq!(events.first(), Some(&StreamEvent::start(START_MESSAGE)));
    assert_eq!(events.last(), Some(&StreamEvent::error(TIMEOUT_MESSAGE)));
    assert_eq!(events.len(), 2);
    assert!(body.contains(": heartbeat\n\n"));
}

#[tokio::test]
async fn invalid_user_id_is_a_bad_request() {
    for uri in ["/api/sleep/advice", "/api/sleep/advice?userId=abc"] {
        let advice = Arc::new(ScriptedAdvice::fragments(&[]));
        let (status, content_type, body) = get(app(Ok(week()), advice), uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(content_type.starts_with("application/json"));
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }
}

#[tokio::test]
async fn stats_failure_is_an_internal_error_before_streaming() {
    let advice = Arc::new(ScriptedAdvice::fragments(&["never"]));
    let (status, _, body) = get(
        app(Err(PortError::Unexpected("db down".to_string())), advice.clone()),
        "/api/sleep/advice?userId=1",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);
    assert!(advice.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn weekly_stats_are_served_in_an_envelope() {
    let advice = Arc::new(ScriptedAdvice::fragments(&[]));
    let (status, _, body) = get(app(Ok(week()), advice), "/api/sleep/stats?userId=1").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["dailyAverage"], 6.75);
    assert_eq!(json["data"]["series"][0]["date"], "2024-03-07");
    assert_eq!(json["data"]["series"][1]["durationHours"], 6.0);
}

#[tokio::test]
async fn health_reports_ok() {
    let advice = Arc::new(ScriptedAdvice::fragments(&[]));
    let (status, _, body) = get(app(Ok(week()), advice), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn client_reassembles_advice_over_a_real_connection() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(
        Ok(week()),
        Arc::new(ScriptedAdvice::fragments(&["안녕", "하세요"])),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut consumer = AdviceConsumer::new(ConsumerConfig {
        base_url: format!("http://{}/api", addr),
        timeout: Duration::from_secs(10),
    });
    consumer.request_advice(1);
    let view = consumer.finished().await;

    assert_eq!(view.phase, Phase::Completed);
    assert_eq!(view.text, "안녕하세요");
    assert_eq!(view.status.as_deref(), Some(START_MESSAGE));
    assert!(!view.loading);
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn client_renders_the_insufficient_data_envelope() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(
        Ok(WeeklyStats::default()),
        Arc::new(ScriptedAdvice::fragments(&[])),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut consumer = AdviceConsumer::new(ConsumerConfig {
        base_url: format!("http://{}/api", addr),
        timeout: Duration::from_secs(10),
    });
    consumer.request_advice(1);
    let view = consumer.finished().await;

    assert_eq!(view.phase, Phase::Completed);
    assert_eq!(view.text, INSUFFICIENT_DATA_MESSAGE);
}

//! crates/advice_client/src/consumer.rs
//!
//! Opens advice streams and publishes their rendered state.
//!
//! At most one stream is active per consumer. Starting a new request, calling
//! `cancel`, or dropping the consumer tears the active stream down, which
//! closes its HTTP connection so the server can release the upstream call.

use crate::error::ClientError;
use crate::frame::decode_events;
use crate::view::{AdviceView, Flow};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use sleep_advice_core::protocol::{AdviceBody, ApiResponse, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shown when no terminal event arrives within the local timeout.
pub const TIMEOUT_MESSAGE: &str = "AI 조언 응답 시간이 초과되었습니다. 다시 시도해주세요.";

/// Where and how long to wait for advice.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base URL of the API, including the `/api` prefix.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

struct ActiveStream {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Client-side consumer of the advice stream.
pub struct AdviceConsumer {
    http: reqwest::Client,
    config: ConsumerConfig,
    view: Arc<watch::Sender<AdviceView>>,
    active: Option<ActiveStream>,
}

impl AdviceConsumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: ConsumerConfig) -> Self {
        let (view, _) = watch::channel(AdviceView::default());
        Self {
            http,
            config,
            view: Arc::new(view),
            active: None,
        }
    }

    /// Receives every change of the rendered state.
    pub fn subscribe(&self) -> watch::Receiver<AdviceView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> AdviceView {
        self.view.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|active| !active.task.is_finished())
    }

    /// Starts a new advice request, tearing down any stream still open.
    ///
    /// Must be called within a Tokio runtime.
    pub fn request_advice(&mut self, user_id: i64) {
        self.teardown();
        self.view.send_replace(AdviceView::loading());

        let cancel = CancellationToken::new();
        let url = format!(
            "{}/sleep/advice?userId={}",
            self.config.base_url.trim_end_matches('/'),
            user_id
        );
        let publisher = Publisher {
            view: self.view.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(drive(
            self.http.clone(),
            url,
            self.config.timeout,
            publisher,
        ));
        self.active = Some(ActiveStream { cancel, task });
    }

    /// Closes the active stream without waiting for further events.
    pub fn cancel(&mut self) {
        if self.teardown() {
            self.view.send_modify(AdviceView::cancel);
        }
    }

    /// Waits for the active stream to end and returns the final state.
    pub async fn finished(&mut self) -> AdviceView {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.task.await {
                warn!("Advice stream task ended abnormally: {}", e);
            }
        }
        self.view()
    }

    fn teardown(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.cancel.cancel();
                active.task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for AdviceConsumer {
    fn drop(&mut self) {
        self.teardown();
    }
}

//=========================================================================================
// Stream Task
//=========================================================================================

/// Writes into the shared view unless its stream was torn down.
struct Publisher {
    view: Arc<watch::Sender<AdviceView>>,
    cancel: CancellationToken,
}

impl Publisher {
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut AdviceView),
    {
        // The token is cancelled before a teardown takes the lock, so a stale
        // stream can never overwrite the state of a newer request.
        self.view.send_if_modified(|view| {
            if self.cancel.is_cancelled() {
                return false;
            }
            f(view);
            true
        })
    }

    fn apply(&self, event: StreamEvent) -> Flow {
        let mut flow = Flow::Finished;
        self.update(|view| flow = view.apply(event));
        flow
    }
}

async fn drive(http: reqwest::Client, url: String, timeout: Duration, publisher: Publisher) {
    let cancel = publisher.cancel.clone();
    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = tokio::time::timeout(timeout, consume(&http, &url, &publisher)) => result,
    };

    match result {
        Ok(Ok(())) => debug!("Advice stream from {} finished.", url),
        Ok(Err(e)) => {
            warn!("Advice request to {} failed: {}", url, e);
            publisher.update(|view| view.fail(e.to_string()));
        }
        Err(_) => {
            warn!("Advice request to {} timed out after {:?}.", url, timeout);
            publisher.update(|view| view.fail(TIMEOUT_MESSAGE));
        }
    }
}

async fn consume(http: &reqwest::Client, url: &str, publisher: &Publisher) -> Result<(), ClientError> {
    let response = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<()>>(&body)
            .ok()
            .and_then(|envelope| envelope.error)
            .unwrap_or(body);
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let is_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"));

    if !is_stream {
        let envelope: ApiResponse<AdviceBody> = serde_json::from_slice(&response.bytes().await?)?;
        return match envelope.data {
            Some(body) if envelope.success => {
                publisher.update(|view| view.complete_with(body.advice));
                Ok(())
            }
            _ => Err(ClientError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| "no advice in the response".to_string()),
            )),
        };
    }

    let mut events = std::pin::pin!(decode_events(response.bytes_stream()));
    while let Some(event) = events.next().await {
        if publisher.apply(event?) == Flow::Finished {
            return Ok(());
        }
    }
    Err(ClientError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Phase;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SSE_HEAD: &str = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n";

    /// Serves one connection: writes `head`, then each frame, then holds the
    /// socket open until the client goes away. Returns the base URL and a
    /// flag raised once the client has closed the connection.
    async fn serve_once(head: &'static str, frames: Vec<String>) -> (String, Arc<AtomicBool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            socket.write_all(head.as_bytes()).await.unwrap();
            for frame in frames {
                socket.write_all(frame.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            flag.store(true, Ordering::SeqCst);
        });

        (format!("http://{}/api", addr), closed)
    }

    fn frame(event: &StreamEvent) -> String {
        format!("data: {}\n\n", serde_json::to_string(event).unwrap())
    }

    fn consumer(base_url: String, timeout: Duration) -> AdviceConsumer {
        AdviceConsumer::new(ConsumerConfig { base_url, timeout })
    }

    #[tokio::test]
    async fn streamed_advice_is_reassembled() {
        let frames = vec![
            frame(&StreamEvent::start("분석 중")),
            ": heartbeat\n\n".to_string(),
            frame(&StreamEvent::chunk("안녕", "안녕")),
            "data: {not json}\n\n".to_string(),
            frame(&StreamEvent::chunk("하세요", "안녕하세요")),
            frame(&StreamEvent::complete("안녕하세요")),
        ];
        let (base_url, _) = serve_once(SSE_HEAD, frames).await;
        let mut consumer = consumer(base_url, Duration::from_secs(10));

        consumer.request_advice(1);
        let view = consumer.finished().await;

        assert_eq!(view.phase, Phase::Completed);
        assert_eq!(view.text, "안녕하세요");
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn plain_envelope_is_rendered_as_completed_advice() {
        let body = r#"{"success":true,"data":{"advice":"기록이 없습니다."}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let head: &'static str = Box::leak(response.into_boxed_str());
        let (base_url, _) = serve_once(head, vec![]).await;
        let mut consumer = consumer(base_url, Duration::from_secs(10));

        consumer.request_advice(1);
        let view = consumer.finished().await;

        assert_eq!(view.phase, Phase::Completed);
        assert_eq!(view.text, "기록이 없습니다.");
    }

    #[tokio::test]
    async fn error_status_surfaces_the_envelope_message() {
        let body = r#"{"success":false,"error":"invalid userId"}"#;
        let response = format!(
            "HTTP/1.1 400 Bad Request\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let head: &'static str = Box::leak(response.into_boxed_str());
        let (base_url, _) = serve_once(head, vec![]).await;
        let mut consumer = consumer(base_url, Duration::from_secs(10));

        consumer.request_advice(1);
        let view = consumer.finished().await;

        assert_eq!(view.phase, Phase::Failed);
        assert!(view.error.unwrap().contains("invalid userId"));
    }

    #[tokio::test]
    async fn missing_terminal_event_times_out_locally() {
        let (base_url, closed) =
            serve_once(SSE_HEAD, vec![frame(&StreamEvent::start("분석 중"))]).await;
        let mut consumer = consumer(base_url, Duration::from_millis(300));

        consumer.request_advice(1);
        let view = consumer.finished().await;

        assert_eq!(view.phase, Phase::Failed);
        assert_eq!(view.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(!view.loading);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_closes_the_connection_without_an_error() {
        let (base_url, closed) = serve_once(
            SSE_HEAD,
            vec![
                frame(&StreamEvent::start("분석 중")),
                frame(&StreamEvent::chunk("부분", "부분")),
            ],
        )
        .await;
        let mut consumer = consumer(base_url, Duration::from_secs(10));
        let mut updates = consumer.subscribe();

        consumer.request_advice(1);
        updates
            .wait_for(|view| view.text == "부분")
            .await
            .unwrap();
        consumer.cancel();

        let view = consumer.view();
        assert_eq!(view.phase, Phase::Cancelled);
        assert_eq!(view.error, None);
        assert!(!view.loading);
        assert!(!consumer.is_active());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_new_request_replaces_the_active_stream() {
        let (first_url, first_closed) =
            serve_once(SSE_HEAD, vec![frame(&StreamEvent::start("first"))]).await;
        let mut consumer = consumer(first_url, Duration::from_secs(10));
        let mut updates = consumer.subscribe();

        consumer.request_advice(1);
        updates
            .wait_for(|view| view.status.as_deref() == Some("first"))
            .await
            .unwrap();

        let (second_url, _) = serve_once(
            SSE_HEAD,
            vec![
                frame(&StreamEvent::start("second")),
                frame(&StreamEvent::complete("done")),
            ],
        )
        .await;
        consumer.config.base_url = second_url;
        consumer.request_advice(1);
        let view = consumer.finished().await;

        assert_eq!(view.status.as_deref(), Some("second"));
        assert_eq!(view.text, "done");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(first_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropping_the_consumer_closes_the_open_stream() {
        let (base_url, closed) =
            serve_once(SSE_HEAD, vec![frame(&StreamEvent::start("분석 중"))]).await;
        let mut consumer = consumer(base_url, Duration::from_secs(10));
        let mut updates = consumer.subscribe();

        consumer.request_advice(1);
        updates
            .wait_for(|view| view.status.is_some())
            .await
            .unwrap();
        assert!(consumer.is_active());
        assert!(!closed.load(Ordering::SeqCst));

        drop(consumer);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(closed.load(Ordering::SeqCst));
        assert!(updates.borrow().loading);
    }
}

//! Throwaway HTTP servers for exercising the monitoring client.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct CaptureState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: StatusCode,
    delay: Duration,
    fail_first: usize,
    seen: Arc<AtomicUsize>,
}

pub struct CaptureServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CaptureServer {
    pub async fn start(status: StatusCode) -> Self {
        Self::spawn(status, Duration::ZERO, 0).await
    }

    pub async fn start_with_delay(status: StatusCode, delay: Duration) -> Self {
        Self::spawn(status, delay, 0).await
    }

    /// Answers 503 to the first `failures` requests, then 200.
    pub async fn start_failing_first(failures: usize) -> Self {
        Self::spawn(StatusCode::OK, Duration::ZERO, failures).await
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn spawn(status: StatusCode, delay: Duration, fail_first: usize) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = CaptureState {
            requests: requests.clone(),
            status,
            delay,
            fail_first,
            seen: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new().fallback(capture).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }
}

async fn capture(
    State(state): State<CaptureState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(CapturedRequest {
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        accept: header_value(header::ACCEPT),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let seen = state.seen.fetch_add(1, Ordering::SeqCst);
    if seen < state.fail_first {
        return (StatusCode::SERVICE_UNAVAILABLE, "{\"error\":\"busy\"}");
    }
    (state.status, "{\"success\":true}")
}

/// Accepts connections and answers each one with `reply` verbatim.
pub async fn spawn_raw_server(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}")
}

/// A local URL nothing is listening on.
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::monitor::config::MonitorConfig;
use crate::monitor::models::{ErrorRecord, SystemMetricsSample};

pub const METRICS_PATH: &str = "/metrics";
pub const ERRORS_PATH: &str = "/errors";
pub const PING_PATH: &str = "/ping";

/// Base delay between attempts; multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No API key configured for the monitoring service")]
    MissingApiKey,
    #[error("API key cannot be used in an Authorization header: {0}")]
    InvalidApiKey(#[from] header::InvalidHeaderValue),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
enum SendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Monitoring service returned non-success status: {0}")]
    Status(StatusCode),
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SendError {
    /// Client errors will not get better by asking again.
    fn is_retryable(&self) -> bool {
        match self {
            SendError::Network(_) => true,
            SendError::Status(status) => status.is_server_error(),
            SendError::Encode(_) => false,
        }
    }
}

/// Best-effort client for the ingestion endpoints.
///
/// Every operation reports success as a `bool`; failures are logged and never
/// reach the caller.
#[derive(Debug, Clone)]
pub struct MonitoringClient {
    client: Client,
    base_url: String,
    retry_attempts: u32,
}

impl MonitoringClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        retry_attempts: u32,
    ) -> Result<Self, ClientError> {
        let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth_value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_attempts: retry_attempts.max(1),
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, ClientError> {
        let api_key = config.api_key.as_deref().ok_or(ClientError::MissingApiKey)?;
        Self::new(
            &config.api_url,
            api_key,
            config.request_timeout(),
            config.retry_attempts,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send_metrics(&self, sample: &SystemMetricsSample) -> bool {
        self.deliver(METRICS_PATH, Some(sample), "metrics").await
    }

    pub async fn send_error(&self, record: &ErrorRecord) -> bool {
        self.deliver(ERRORS_PATH, Some(record), "error").await
    }

    /// Tells the service the application is alive.
    pub async fn ping(&self) -> bool {
        self.deliver::<()>(PING_PATH, None, "ping").await
    }

    async fn deliver<T: Serialize>(&self, path: &str, body: Option<&T>, what: &'static str) -> bool {
        let url = format!("{}{}", self.base_url, path);
        let body = match body.map(serde_json::to_vec).transpose() {
            Ok(body) => body,
            Err(e) => {
                warn!(kind = what, error = %SendError::from(e), "Failed to send to monitoring service.");
                return false;
            }
        };

        let mut attempt = 1;
        loop {
            match self.post_once(&url, body.clone()).await {
                Ok(status) => {
                    info!(kind = what, status = status.as_u16(), "Sent to monitoring service.");
                    return true;
                }
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    warn!(
                        kind = what,
                        attempt,
                        max_attempts = self.retry_attempts,
                        error = %e,
                        "Monitoring service call failed, retrying."
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(kind = what, attempt, error = %e, "Failed to send to monitoring service.");
                    return false;
                }
            }
        }
    }

    async fn post_once(&self, url: &str, body: Option<Vec<u8>>) -> Result<StatusCode, SendError> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(SendError::Status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::ErrorLevel;
    use crate::monitor::test_support::{CaptureServer, spawn_raw_server, unused_local_url};
    use chrono::Utc;

    fn sample() -> SystemMetricsSample {
        SystemMetricsSample {
            timestamp: Utc::now(),
            memory_usage: 10.0,
            cpu_usage: 20.0,
            disk_usage: 30.0,
            active_users: 2,
            response_time: 45.5,
        }
    }

    fn record() -> ErrorRecord {
        ErrorRecord {
            timestamp: Utc::now(),
            level: ErrorLevel::Critical,
            message: "division by zero".to_string(),
            file: "src/math.rs".to_string(),
            line: 7,
            trace: "#0 divide".to_string(),
            user_id: None,
            ip_address: "unknown".to_string(),
            user_agent: "unknown".to_string(),
            request_url: "unknown".to_string(),
            request_method: "unknown".to_string(),
        }
    }

    fn client_for(base_url: &str, timeout: Duration, attempts: u32) -> MonitoringClient {
        MonitoringClient::new(base_url, "pm_test_key", timeout, attempts).unwrap()
    }

    #[tokio::test]
    async fn test_requests_carry_auth_and_json_headers() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let client = client_for(&format!("{}/", server.base_url), Duration::from_secs(2), 1);

        assert!(client.send_metrics(&sample()).await);
        assert!(client.send_error(&record()).await);
        assert!(client.ping().await);

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].path, "/metrics");
        assert_eq!(requests[1].path, "/errors");
        assert_eq!(requests[2].path, "/ping");
        for request in &requests {
            assert_eq!(request.authorization.as_deref(), Some("Bearer pm_test_key"));
            assert_eq!(request.content_type.as_deref(), Some("application/json"));
            assert_eq!(request.accept.as_deref(), Some("application/json"));
        }
        assert_eq!(requests[0].body["response_time"], 45.5);
        assert_eq!(requests[1].body["level"], "critical");
        assert!(requests[2].body.is_null());
    }

    #[tokio::test]
    async fn test_server_error_returns_false() {
        let server = CaptureServer::start(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = client_for(&server.base_url, Duration::from_secs(2), 1);
        assert!(!client.send_metrics(&sample()).await);
        assert!(!client.send_error(&record()).await);
        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn test_connection_refused_returns_false() {
        let client = client_for(&unused_local_url().await, Duration::from_secs(2), 1);
        assert!(!client.send_metrics(&sample()).await);
        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn test_timeout_returns_false() {
        let server = CaptureServer::start_with_delay(StatusCode::OK, Duration::from_secs(3)).await;
        let client = client_for(&server.base_url, Duration::from_millis(200), 1);
        assert!(!client.send_error(&record()).await);
    }

    #[tokio::test]
    async fn test_malformed_response_returns_false() {
        let base_url = spawn_raw_server(b"this is not http\r\n\r\n").await;
        let client = client_for(&base_url, Duration::from_secs(2), 1);
        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_up_to_the_limit() {
        let server = CaptureServer::start(StatusCode::SERVICE_UNAVAILABLE).await;
        let client = client_for(&server.base_url, Duration::from_secs(2), 3);
        assert!(!client.ping().await);
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = CaptureServer::start(StatusCode::UNAUTHORIZED).await;
        let client = client_for(&server.base_url, Duration::from_secs(2), 3);
        assert!(!client.send_metrics(&sample()).await);
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let server = CaptureServer::start_failing_first(1).await;
        let client = client_for(&server.base_url, Duration::from_secs(2), 3);
        assert!(client.send_metrics(&sample()).await);
        assert_eq!(server.requests().len(), 2);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = MonitorConfig::default();
        assert!(matches!(
            MonitoringClient::from_config(&config),
            Err(ClientError::MissingApiKey)
        ));
    }

    #[test]
    fn test_invalid_api_key_is_rejected() {
        let result = MonitoringClient::new("http://localhost", "bad\nkey", Duration::from_secs(1), 1);
        assert!(matches!(result, Err(ClientError::InvalidApiKey(_))));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let client = client_for("http://localhost:1/", Duration::from_secs(1), 0);
        assert_eq!(client.retry_attempts, 1);
        assert_eq!(client.base_url(), "http://localhost:1");
    }
}

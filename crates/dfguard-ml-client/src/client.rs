//! Inference HTTP client.

use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::InferenceRequest;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of response-body characters kept in error reports.
pub const DEFAULT_BODY_PREVIEW_CHARS: usize = 512;

/// Configuration for an inference client.
#[derive(Clone)]
pub struct InferenceClientConfig {
    /// Endpoint receiving the POST
    pub endpoint_url: String,
    /// Bearer token
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retries for transient failures (network, timeout, 429, 5xx)
    pub max_retries: u32,
    /// Response body characters kept in error reports
    pub body_preview_chars: usize,
}

impl std::fmt::Debug for InferenceClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClientConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("body_preview_chars", &self.body_preview_chars)
            .finish()
    }
}

impl InferenceClientConfig {
    /// Config with default timeout and no retries.
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            body_preview_chars: DEFAULT_BODY_PREVIEW_CHARS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Client for one remote classifier endpoint.
#[derive(Clone)]
pub struct InferenceClient {
    http: Client,
    endpoint: Url,
    config: InferenceClientConfig,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceClientConfig) -> MlResult<Self> {
        let endpoint = Url::parse(&config.endpoint_url)
            .map_err(|e| MlError::Config(format!("invalid endpoint URL '{}': {}", config.endpoint_url, e)))?;
        if config.api_key.trim().is_empty() {
            return Err(MlError::Config("API key is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    pub fn config(&self) -> &InferenceClientConfig {
        &self.config
    }

    /// Send one base64 payload and return the raw JSON response.
    pub async fn infer(&self, inputs: &str) -> MlResult<Value> {
        self.with_retry(|| self.infer_once(inputs)).await
    }

    /// Like [`infer`](Self::infer), aborting the in-flight call once `cancel_rx` reads `true`.
    pub async fn infer_cancellable(
        &self,
        inputs: &str,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> MlResult<Value> {
        if *cancel_rx.borrow_and_update() {
            return Err(MlError::Cancelled);
        }

        tokio::select! {
            result = self.infer(inputs) => result,
            _ = wait_for_cancel(&mut cancel_rx) => {
                debug!(endpoint = %self.endpoint, "Inference call cancelled");
                Err(MlError::Cancelled)
            }
        }
    }

    async fn infer_once(&self, inputs: &str) -> MlResult<Value> {
        let started = Instant::now();
        let request = InferenceRequest::new(inputs);

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        debug!(
            endpoint = %self.endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inference response received"
        );

        if !status.is_success() {
            return Err(MlError::Status {
                status_code: status.as_u16(),
                body_preview: preview(&body, self.config.body_preview_chars),
            });
        }

        serde_json::from_slice(&body).map_err(|e| MlError::InvalidResponse {
            body_preview: preview(&body, self.config.body_preview_chars),
            cause: e.to_string(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> MlError {
        if err.is_timeout() {
            MlError::Timeout(self.config.timeout)
        } else {
            MlError::Network(err)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Inference request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Lossy UTF-8 prefix of a response body.
fn preview(body: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}

async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> InferenceClient {
        let config = InferenceClientConfig::new(format!("{}/classify", server.uri()), "secret-token")
            .with_timeout(Duration::from_secs(5));
        InferenceClient::new(config).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = InferenceClientConfig::new("http://localhost:9000", "k");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);
        assert!(!format!("{:?}", config).contains("\"k\""));
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            InferenceClient::new(InferenceClientConfig::new("not a url", "k")),
            Err(MlError::Config(_))
        ));
        assert!(matches!(
            InferenceClient::new(InferenceClientConfig::new("http://localhost:1", " ")),
            Err(MlError::Config(_))
        ));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview(b"short", 10), "short");
        assert_eq!(preview(b"abcdefghij", 4), "abcd...");
    }

    #[tokio::test]
    async fn test_infer_sends_body_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(json!({"inputs": "iVBORw0KGgo=", "parameters": {}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"label": "realism", "score": 0.8}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = client_for(&server).infer("iVBORw0KGgo=").await.unwrap();
        assert_eq!(output, json!([{"label": "realism", "score": 0.8}]));
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_preview() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model is loading"))
            .mount(&server)
            .await;

        let err = client_for(&server).infer("x").await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.body_preview(), Some("model is loading"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).infer("x").await.unwrap_err();
        assert!(matches!(err, MlError::InvalidResponse { .. }));
        assert_eq!(err.body_preview(), Some("<html>oops</html>"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = InferenceClientConfig::new(server.uri(), "k").with_timeout(Duration::from_millis(200));
        let err = InferenceClient::new(config).unwrap().infer("x").await.unwrap_err();
        assert!(matches!(err, MlError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"label": "real", "score": 0.5})))
            .mount(&server)
            .await;

        let config = InferenceClientConfig::new(server.uri(), "k").with_max_retries(1);
        let output = InferenceClient::new(config).unwrap().infer("x").await.unwrap();
        assert_eq!(output["label"], "real");
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, rx) = watch::channel(false);
        let call = tokio::spawn(async move { client.infer_cancellable("x", rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), call)
            .await
            .expect("cancel should end the call promptly")
            .unwrap();
        assert!(matches!(result, Err(MlError::Cancelled)));
    }
}

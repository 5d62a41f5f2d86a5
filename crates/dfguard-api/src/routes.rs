//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    analyze_audio, analyze_video, delete_log, get_log, health, list_logs,
    list_logs_by_classification, ready,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let analysis_routes = Router::new()
        .route("/analyze_video", post(analyze_video))
        .route("/analyze_audio", post(analyze_audio));

    let log_routes = Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/by_classification", get(list_logs_by_classification))
        .route("/logs/:id", get(get_log).delete(delete_log));

    let api_routes = Router::new().merge(analysis_routes).merge(log_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit instead of axum's default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use dfguard_ml_client::MlResult;
    use dfguard_pipeline::{AnalysisSettings, AudioAnalyzer, Classifier, VideoAnalyzer};
    use dfguard_storage::InMemoryLogStore;

    use crate::config::ApiConfig;

    struct FixedClassifier(Value);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(
            &self,
            _inputs: &str,
            _cancel_rx: Option<watch::Receiver<bool>>,
        ) -> MlResult<Value> {
            Ok(self.0.clone())
        }
    }

    fn app(with_audio: bool) -> Router {
        let classifier = Arc::new(FixedClassifier(json!([
            {"label": "spoof", "score": 0.93},
            {"label": "bonafide", "score": 0.07}
        ])));
        let (_tx, shutdown) = watch::channel(false);
        let state = AppState {
            config: ApiConfig::default(),
            video: VideoAnalyzer::new(classifier.clone(), AnalysisSettings::default()),
            audio: with_audio.then(|| AudioAnalyzer::new(classifier, 10.0)),
            logs: Arc::new(InMemoryLogStore::new()),
            shutdown,
        };
        create_router(state, None)
    }

    fn wav_bytes() -> Vec<u8> {
        let mut bytes = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        bytes.extend_from_slice(&[0u8; 28]);
        bytes
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_request_id_and_security_headers() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("X-Request-ID", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-123");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_empty_video_is_bad_request() {
        let (status, body) = send(&app(false), post("/api/analyze_video", Vec::new())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "empty_input");
    }

    #[tokio::test]
    async fn test_data_uri_with_bad_base64_is_bad_request() {
        let body = b"data:video/mp4;base64,!!!not-base64!!!".to_vec();
        let (status, body) = send(&app(false), post("/api/analyze_video", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_payload");

        let body = b"data:audio/wav;base64,%%%".to_vec();
        let (status, body) = send(&app(true), post("/api/analyze_audio", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_payload");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_undecodable_video_is_bad_gateway() {
        let junk = vec![0x00, 0x9F, 0x92, 0x96, 0xFF, 0x00, 0x13, 0x37];
        let (status, body) = send(&app(false), post("/api/analyze_video?filename=clip.mp4", junk)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "decode");
    }

    #[tokio::test]
    async fn test_audio_route_requires_endpoint() {
        let (status, _) = send(&app(false), post("/api/analyze_audio", wav_bytes())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_audio_analysis_is_logged_and_queryable() {
        let app = app(true);

        let (status, body) = send(&app, post("/api/analyze_audio", wav_bytes())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["classification"], "Deepfake");
        assert!((body["score"].as_f64().unwrap() - 7.0).abs() < 1e-9);
        assert!(body.get("report").is_none());

        let (status, logs) = send(&app, get("/api/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs.as_array().unwrap().len(), 1);
        assert_eq!(logs[0]["id"], 1);
        assert_eq!(logs[0]["media_kind"], "audio");
        assert_eq!(logs[0]["isDeepFake"], true);

        let (_, fakes) = send(&app, get("/api/logs/by_classification?classification=Deepfake")).await;
        assert_eq!(fakes.as_array().unwrap().len(), 1);
        let (_, real) = send(&app, get("/api/logs/by_classification?classification=bonafide")).await;
        assert!(real.as_array().unwrap().is_empty());
        let (status, _) = send(&app, get("/api/logs/by_classification?classification=maybe")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, log) = send(&app, get("/api/logs/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(log["classification"], "Deepfake");

        let (status, _) = send(&app, delete("/api/logs/1")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, get("/api/logs/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
        let (status, _) = send(&app, delete("/api/logs/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_analysis_is_not_logged() {
        let app = app(true);
        let (status, _) = send(&app, post("/api/analyze_audio", Vec::new())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, logs) = send(&app, get("/api/logs")).await;
        assert!(logs.as_array().unwrap().is_empty());
    }
}

//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use dfguard_models::{AnalysisReport, MediaKind};
use dfguard_pipeline::PipelineError;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "dfguard_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dfguard_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "dfguard_http_requests_in_flight";

    // Analysis metrics
    pub const ANALYSES_TOTAL: &str = "dfguard_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "dfguard_analysis_duration_seconds";
    pub const FRAME_ERRORS_TOTAL: &str = "dfguard_frame_errors_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the outcome of one analysis.
pub fn record_analysis(kind: MediaKind, outcome: Result<(), &PipelineError>, duration_secs: f64) {
    let outcome = match outcome {
        Ok(()) => "success",
        Err(e) => e.kind(),
    };
    let labels = [("kind", kind.as_str().to_string()), ("outcome", outcome.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, "kind" => kind.as_str()).record(duration_secs);
}

/// Count the per-frame failures recorded in a report.
pub fn record_frame_errors(report: &AnalysisReport) {
    for error in &report.errors {
        counter!(names::FRAME_ERRORS_TOTAL, "stage" => error.stage.as_str()).increment(1);
    }
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    static NUMERIC_ID: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = NUMERIC_ID
        .get_or_init(|| regex_lite::Regex::new(r"/[0-9]+(/|$)").expect("valid regex"));
    re.replace_all(path, "/:id$1").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

//! Video analysis orchestration.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, Instrument};

use dfguard_media::{
    encode_frame, sample_frames, DecodedFrame, EncodedFrame, FfmpegDecoder, FrameSource, MediaBlob,
    MediaError, ReservoirSample,
};
use dfguard_ml_client::{InferenceClient, MlError};
use dfguard_models::{
    AnalysisReport, FinalVerdict, FrameError, MediaKind, PerFrameResult, ReportMetadata,
    SampleWindow, DEFAULT_BONAFIDE_THRESHOLD,
};

use crate::aggregate::aggregate_verdict;
use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{AnalysisContext, AnalysisLogger, PipelineStage};

/// Sampling and classification policy for one analyzer.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    pub window: SampleWindow,
    /// Realism threshold on the 0..100 scale
    pub bonafide_threshold: f64,
    /// Max in-flight classifier calls; 1 classifies frames one after another
    pub concurrency: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            window: SampleWindow::default(),
            bonafide_threshold: DEFAULT_BONAFIDE_THRESHOLD,
            concurrency: 1,
        }
    }
}

impl From<&PipelineConfig> for AnalysisSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            window: config.window,
            bonafide_threshold: config.bonafide_threshold,
            concurrency: config.inference_concurrency,
        }
    }
}

/// Successful video analysis.
#[derive(Debug, Clone, Serialize)]
pub struct VideoAnalysis {
    pub verdict: FinalVerdict,
    pub report: AnalysisReport,
}

enum FrameOutcome {
    Classified(PerFrameResult),
    Failed(FrameError),
    Cancelled,
}

/// Decodes, samples and classifies uploaded videos.
#[derive(Clone)]
pub struct VideoAnalyzer {
    classifier: Arc<dyn Classifier>,
    settings: AnalysisSettings,
}

impl VideoAnalyzer {
    pub fn new(classifier: Arc<dyn Classifier>, settings: AnalysisSettings) -> Self {
        Self {
            classifier,
            settings,
        }
    }

    /// Build an analyzer backed by the configured image classifier.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let client = InferenceClient::new(config.image_client_config())
            .map_err(|e| PipelineError::config(e.to_string()))?;
        Ok(Self::new(Arc::new(client), AnalysisSettings::from(config)))
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Normalize an uploaded payload and analyze it.
    pub async fn analyze_payload(
        &self,
        payload: Vec<u8>,
        filename: Option<&str>,
        ctx: &AnalysisContext,
    ) -> PipelineResult<VideoAnalysis> {
        let blob = match MediaBlob::from_payload(payload) {
            Ok(blob) => blob,
            Err(e) => {
                let err = PipelineError::from(e);
                AnalysisLogger::new(ctx.request_id(), MediaKind::Video).failed(&err);
                return Err(err);
            }
        };
        let blob = match filename {
            Some(name) => blob.with_filename(name),
            None => blob,
        };
        self.analyze(&blob, ctx).await
    }

    /// Run the full pipeline over one video.
    pub async fn analyze(
        &self,
        blob: &MediaBlob,
        ctx: &AnalysisContext,
    ) -> PipelineResult<VideoAnalysis> {
        let logger = AnalysisLogger::new(ctx.request_id(), MediaKind::Video);
        let result = self
            .run_blob(blob, ctx, &logger)
            .instrument(logger.create_span())
            .await;

        if let Err(e) = &result {
            logger.failed(e);
        }
        result
    }

    /// Run sampling, inference and aggregation over an already-open frame source.
    pub async fn analyze_source<S, R>(
        &self,
        source: &mut S,
        rng: R,
        ctx: &AnalysisContext,
    ) -> PipelineResult<VideoAnalysis>
    where
        S: FrameSource + ?Sized,
        R: Rng + Send,
    {
        let logger = AnalysisLogger::new(ctx.request_id(), MediaKind::Video);
        let result = self
            .run_source(source, rng, ctx, &logger)
            .instrument(logger.create_span())
            .await;

        if let Err(e) = &result {
            logger.failed(e);
        }
        result
    }

    async fn run_blob(
        &self,
        blob: &MediaBlob,
        ctx: &AnalysisContext,
        logger: &AnalysisLogger,
    ) -> PipelineResult<VideoAnalysis> {
        logger.stage(
            PipelineStage::Received,
            &format!("Received {} byte video", blob.len()),
        );
        if blob.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        // The decoder, its temp file and the FFmpeg child are released
        // before any frame is classified.
        let sample = {
            logger.stage(PipelineStage::Decoding, "Opening video stream");
            let mut decoder = FfmpegDecoder::open(blob, self.settings.window).await?;
            if let Some(cancel_rx) = ctx.cancel_rx() {
                decoder = decoder.with_cancel(cancel_rx);
            }
            self.sample(&mut decoder, StdRng::from_os_rng(), logger).await?
        };

        self.classify_sample(sample, ctx, logger).await
    }

    async fn run_source<S, R>(
        &self,
        source: &mut S,
        rng: R,
        ctx: &AnalysisContext,
        logger: &AnalysisLogger,
    ) -> PipelineResult<VideoAnalysis>
    where
        S: FrameSource + ?Sized,
        R: Rng + Send,
    {
        logger.stage(PipelineStage::Received, "Received frame source");
        let sample = self.sample(source, rng, logger).await?;
        self.classify_sample(sample, ctx, logger).await
    }

    async fn sample<S, R>(
        &self,
        source: &mut S,
        rng: R,
        logger: &AnalysisLogger,
    ) -> PipelineResult<ReservoirSample>
    where
        S: FrameSource + ?Sized,
        R: Rng + Send,
    {
        let window = self.settings.window;
        logger.stage(
            PipelineStage::Sampling,
            &format!(
                "Sampling up to {} frames from the first {}s",
                window.max_frames(),
                window.max_seconds()
            ),
        );
        Ok(sample_frames(source, window, rng).await?)
    }

    async fn classify_sample(
        &self,
        sample: ReservoirSample,
        ctx: &AnalysisContext,
        logger: &AnalysisLogger,
    ) -> PipelineResult<VideoAnalysis> {
        let window = self.settings.window;
        let sampled_frame_indices = sample.indices();
        let returned_frames = sample.len();

        logger.stage(
            PipelineStage::Inferring,
            &format!(
                "Classifying {} of {} scanned frames",
                returned_frames, sample.frames_seen
            ),
        );

        // `buffered` yields in input order, so results stay ascending by index.
        let outcomes: Vec<FrameOutcome> = stream::iter(sample.frames)
            .map(|frame| self.classify_frame(frame, ctx))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut per_frame_results = Vec::with_capacity(returned_frames);
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                FrameOutcome::Classified(result) => per_frame_results.push(result),
                FrameOutcome::Failed(error) => {
                    logger.frame_error(&error);
                    errors.push(error);
                }
                FrameOutcome::Cancelled => return Err(PipelineError::Cancelled),
            }
        }

        let report = AnalysisReport {
            sampled_frame_indices,
            per_frame_results,
            errors,
            metadata: ReportMetadata {
                seconds_window: window.max_seconds(),
                requested_frames: window.max_frames(),
                returned_frames,
            },
        };

        logger.stage(
            PipelineStage::Aggregating,
            &format!(
                "Aggregating {} frame results ({} failed)",
                report.per_frame_results.len(),
                report.errors.len()
            ),
        );
        let verdict = aggregate_verdict(
            &report.per_frame_results,
            report.errors.len(),
            window.max_frames(),
            self.settings.bonafide_threshold,
        )?;

        logger.done(&verdict, Some(&report));
        Ok(VideoAnalysis { verdict, report })
    }

    async fn classify_frame(&self, frame: DecodedFrame, ctx: &AnalysisContext) -> FrameOutcome {
        if ctx.is_cancelled() {
            return FrameOutcome::Cancelled;
        }

        let frame_index = frame.index;
        let encoded = match encode_off_thread(frame).await {
            Ok(encoded) => encoded,
            Err(e) => return FrameOutcome::Failed(FrameError::encode(frame_index, e.to_string())),
        };
        debug!(frame_index, png_len = encoded.png_len, "Frame encoded");

        let started = Instant::now();
        match self
            .classifier
            .classify(&encoded.base64_png, ctx.cancel_rx())
            .await
        {
            Ok(raw_output) => FrameOutcome::Classified(PerFrameResult {
                frame_index,
                timestamp_ms: encoded.timestamp_ms,
                elapsed_ms: started.elapsed().as_millis() as u64,
                raw_output,
            }),
            Err(MlError::Cancelled) => FrameOutcome::Cancelled,
            Err(e) => FrameOutcome::Failed(FrameError::inference(
                frame_index,
                e.to_string(),
                e.status_code(),
                e.body_preview().map(str::to_string),
            )),
        }
    }
}

/// Encode on the blocking pool.
async fn encode_off_thread(frame: DecodedFrame) -> Result<EncodedFrame, MediaError> {
    let frame_index = frame.index;
    tokio::task::spawn_blocking(move || encode_frame(&frame))
        .await
        .map_err(|e| MediaError::encode_failed(frame_index, e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use dfguard_media::VecFrameSource;
    use dfguard_ml_client::{InferenceClientConfig, MlResult};
    use dfguard_models::{Classification, FrameStage};
    use image::{Rgb, RgbImage};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::watch;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Responder = dyn Fn(u64) -> MlResult<Value> + Send + Sync;

    /// Classifier that recovers the frame index from the pixel data.
    struct StubClassifier {
        respond: Box<Responder>,
        calls: AtomicUsize,
        delay: Option<fn(u64) -> Duration>,
    }

    impl StubClassifier {
        fn new(respond: impl Fn(u64) -> MlResult<Value> + Send + Sync + 'static) -> Self {
            Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(
            &self,
            inputs: &str,
            _cancel_rx: Option<watch::Receiver<bool>>,
        ) -> MlResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let png = STANDARD.decode(inputs).unwrap();
            let image = image::load_from_memory(&png).unwrap().to_rgb8();
            let index = u64::from(image.get_pixel(0, 0)[0]);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay(index)).await;
            }
            (self.respond)(index)
        }
    }

    fn frames(count: u64) -> Vec<DecodedFrame> {
        (0..count)
            .map(|index| DecodedFrame {
                index,
                timestamp_ms: index * 100,
                image: RgbImage::from_pixel(4, 4, Rgb([index as u8, 0, 0])),
            })
            .collect()
    }

    fn realism(score: f64) -> Value {
        json!([{"label": "realism", "score": score}, {"label": "deepfake", "score": 1.0 - score}])
    }

    fn unavailable() -> MlError {
        MlError::Status {
            status_code: 503,
            body_preview: "model loading".to_string(),
        }
    }

    fn analyzer(classifier: Arc<dyn Classifier>, concurrency: usize) -> VideoAnalyzer {
        VideoAnalyzer::new(
            classifier,
            AnalysisSettings {
                window: SampleWindow::new(10, 10).unwrap(),
                bonafide_threshold: 10.0,
                concurrency,
            },
        )
    }

    async fn run(analyzer: &VideoAnalyzer, count: u64) -> PipelineResult<VideoAnalysis> {
        let mut source = VecFrameSource::new(frames(count));
        analyzer
            .analyze_source(&mut source, StdRng::seed_from_u64(7), &AnalysisContext::new("test"))
            .await
    }

    #[tokio::test]
    async fn test_partial_failures_are_collected() {
        let failing = [2u64, 5, 7];
        let stub = StubClassifier::new(move |index| {
            if failing.contains(&index) {
                Err(unavailable())
            } else {
                Ok(realism((index + 1) as f64 / 20.0))
            }
        });
        let analysis = run(&analyzer(Arc::new(stub), 1), 10).await.unwrap();
        let report = &analysis.report;

        assert_eq!(report.sampled_frame_indices, (0..10).collect::<Vec<_>>());
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.per_frame_results.len(), 7);
        assert_eq!(
            report.errors.iter().map(|e| e.frame_index).collect::<Vec<_>>(),
            vec![2, 5, 7]
        );
        assert!(report.errors.iter().all(|e| e.stage == FrameStage::Inference));
        assert_eq!(report.errors[0].status_code, Some(503));
        assert_eq!(report.errors[0].body_preview.as_deref(), Some("model loading"));

        let ok: Vec<u64> = (0..10).filter(|i| !failing.contains(i)).collect();
        let expected = ok.iter().map(|i| (i + 1) as f64 / 20.0).sum::<f64>() / 7.0 * 100.0;
        assert!((analysis.verdict.score - expected).abs() < 1e-9);
        assert_eq!(analysis.verdict.classification, Classification::Bonafide);

        assert_eq!(report.metadata.seconds_window, 10);
        assert_eq!(report.metadata.requested_frames, 10);
        assert_eq!(report.metadata.returned_frames, 10);
    }

    #[tokio::test]
    async fn test_encode_failure_is_recorded_and_siblings_classified() {
        let mut sample = frames(3);
        sample[1].image = RgbImage::new(0, 0);

        let stub = Arc::new(StubClassifier::new(|index| Ok(realism((index + 1) as f64 / 10.0))));
        let mut source = VecFrameSource::new(sample);
        let analysis = analyzer(stub.clone(), 2)
            .analyze_source(&mut source, StdRng::seed_from_u64(7), &AnalysisContext::new("test"))
            .await
            .unwrap();
        let report = &analysis.report;

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].frame_index, 1);
        assert_eq!(report.errors[0].stage, FrameStage::Encode);
        assert_eq!(report.errors[0].status_code, None);
        assert_eq!(
            report.per_frame_results.iter().map(|r| r.frame_index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(stub.calls(), 2);
        assert!((analysis.verdict.score - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_failed_is_no_parsable_score() {
        let stub = Arc::new(StubClassifier::new(|_| Err(unavailable())));
        let err = run(&analyzer(stub.clone(), 1), 10).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoParsableScore { attempted: 10, failed: 10 }
        ));
        assert_eq!(stub.calls(), 10);
    }

    #[tokio::test]
    async fn test_unusable_output_is_not_an_error() {
        let stub = StubClassifier::new(|index| match index {
            0 => Err(unavailable()),
            1 => Ok(json!({"label": "fake", "score": 0.9})),
            _ => Ok(realism(0.5)),
        });
        let analysis = run(&analyzer(Arc::new(stub), 1), 3).await.unwrap();

        assert_eq!(analysis.report.errors.len(), 1);
        assert_eq!(analysis.report.per_frame_results.len(), 2);
        assert!((analysis.verdict.score - 50.0).abs() < 1e-9);

        let stub = StubClassifier::new(|_| Ok(json!({"outputs": "nothing useful"})));
        let err = run(&analyzer(Arc::new(stub), 1), 4).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoParsableScore { attempted: 4, failed: 0 }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_frame_order() {
        fn later_frames_answer_first(index: u64) -> Duration {
            Duration::from_millis(50 - index * 5)
        }

        let mut stub = StubClassifier::new(|index| Ok(realism(index as f64 / 100.0)));
        stub.delay = Some(later_frames_answer_first as fn(u64) -> Duration);
        let stub = Arc::new(stub);

        let analysis = run(&analyzer(stub.clone(), 4), 8).await.unwrap();
        let order: Vec<u64> = analysis
            .report
            .per_frame_results
            .iter()
            .map(|r| r.frame_index)
            .collect();
        assert_eq!(order, (0..8).collect::<Vec<_>>());
        assert_eq!(stub.calls(), 8);
    }

    #[tokio::test]
    async fn test_result_timestamps_follow_frames() {
        let stub = StubClassifier::new(|_| Ok(realism(0.3)));
        let analysis = run(&analyzer(Arc::new(stub), 1), 3).await.unwrap();
        let stamps: Vec<u64> = analysis
            .report
            .per_frame_results
            .iter()
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn test_no_frames_fails_before_inference() {
        let stub = Arc::new(StubClassifier::new(|_| Ok(realism(1.0))));
        let err = run(&analyzer(stub.clone(), 1), 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesAvailable { seconds_window: 10 }));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_never_reaches_decoder() {
        let stub = Arc::new(StubClassifier::new(|_| Ok(realism(1.0))));
        let analyzer = analyzer(stub.clone(), 1);
        let ctx = AnalysisContext::new("empty");

        let err = analyzer.analyze_payload(Vec::new(), None, &ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        let err = analyzer
            .analyze_payload(b"data:video/mp4;base64,".to_vec(), Some("clip.mp4"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_inference() {
        let stub = Arc::new(StubClassifier::new(|_| Ok(realism(1.0))));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let ctx = AnalysisContext::new("cancelled").with_cancel(rx);

        let mut source = VecFrameSource::new(frames(5));
        let err = analyzer(stub.clone(), 1)
            .analyze_source(&mut source, StdRng::seed_from_u64(1), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(stub.calls(), 0);

        let stub = StubClassifier::new(|_| Err(MlError::Cancelled));
        let err = run(&analyzer(Arc::new(stub), 1), 5).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn test_partial_failures_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(realism(0.4)))
            .mount(&server)
            .await;

        let client = InferenceClient::new(InferenceClientConfig::new(server.uri(), "token")).unwrap();
        let analysis = run(&analyzer(Arc::new(client), 1), 10).await.unwrap();

        assert_eq!(analysis.report.errors.len(), 3);
        assert_eq!(analysis.report.per_frame_results.len(), 7);
        assert_eq!(
            analysis.report.errors.iter().map(|e| e.frame_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!((analysis.verdict.score - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_analyze_generated_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let status = std::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=3:size=64x48:rate=10"])
            .args(["-pix_fmt", "yuv420p"])
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());

        let payload = std::fs::read(&path).unwrap();
        let stub = Arc::new(StubClassifier::new(|_| Ok(realism(0.9))));
        let analyzer = VideoAnalyzer::new(
            stub.clone(),
            AnalysisSettings {
                window: SampleWindow::new(2, 5).unwrap(),
                ..AnalysisSettings::default()
            },
        );

        let analysis = analyzer
            .analyze_payload(payload, Some("clip.mp4"), &AnalysisContext::new("ffmpeg"))
            .await
            .unwrap();
        assert_eq!(analysis.report.sampled_frame_indices.len(), 5);
        assert!(analysis.report.sampled_frame_indices.iter().all(|i| *i < 20));
        assert!((analysis.verdict.score - 90.0).abs() < 1e-9);
        assert_eq!(stub.calls(), 5);
    }
}

//! Application state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use dfguard_pipeline::{AudioAnalyzer, PipelineConfig, VideoAnalyzer};
use dfguard_storage::{DetectionLogStore, InMemoryLogStore, JsonFileLogStore};

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub video: VideoAnalyzer,
    /// Present only when an audio endpoint is configured
    pub audio: Option<AudioAnalyzer>,
    pub logs: Arc<dyn DetectionLogStore>,
    /// Flips to `true` on shutdown; in-flight analyses stop at the next frame
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(
        config: ApiConfig,
        pipeline: &PipelineConfig,
        shutdown: watch::Receiver<bool>,
    ) -> ApiResult<Self> {
        let video = VideoAnalyzer::from_config(pipeline)?;
        let audio = AudioAnalyzer::from_config(pipeline)?;
        if audio.is_none() {
            info!("AUDIO_INFERENCE_URL not set, audio analysis disabled");
        }

        let logs: Arc<dyn DetectionLogStore> = match &config.detection_log_path {
            Some(path) => Arc::new(JsonFileLogStore::open(path).await?),
            None => Arc::new(InMemoryLogStore::new()),
        };

        Ok(Self {
            config,
            video,
            audio,
            logs,
            shutdown,
        })
    }
}

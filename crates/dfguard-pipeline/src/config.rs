//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use dfguard_ml_client::InferenceClientConfig;
use dfguard_models::{
    SampleWindow, DEFAULT_BONAFIDE_THRESHOLD, DEFAULT_FRAME_COUNT, DEFAULT_WINDOW_SECONDS,
};

use crate::error::{PipelineError, PipelineResult};

/// Analysis pipeline configuration.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Per-frame image classifier endpoint
    pub image_inference_url: String,
    /// Audio classifier endpoint; audio analysis is disabled when unset
    pub audio_inference_url: Option<String>,
    /// Bearer token for both endpoints
    pub api_key: String,
    /// Per-call timeout
    pub inference_timeout: Duration,
    /// Scanned prefix and sample size
    pub window: SampleWindow,
    /// Realism threshold on the 0..100 scale
    pub bonafide_threshold: f64,
    /// Max in-flight frame calls per request
    pub inference_concurrency: usize,
    /// Retries of transient upstream failures per call
    pub inference_max_retries: u32,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("image_inference_url", &self.image_inference_url)
            .field("audio_inference_url", &self.audio_inference_url)
            .field("api_key", &"<redacted>")
            .field("inference_timeout", &self.inference_timeout)
            .field("window", &self.window)
            .field("bonafide_threshold", &self.bonafide_threshold)
            .field("inference_concurrency", &self.inference_concurrency)
            .field("inference_max_retries", &self.inference_max_retries)
            .finish()
    }
}

impl PipelineConfig {
    /// Config with defaults for everything but the endpoint and credential.
    pub fn new(image_inference_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            image_inference_url: image_inference_url.into(),
            audio_inference_url: None,
            api_key: api_key.into(),
            inference_timeout: Duration::from_secs(60),
            window: SampleWindow::default(),
            bonafide_threshold: DEFAULT_BONAFIDE_THRESHOLD,
            inference_concurrency: 1,
            inference_max_retries: 0,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PipelineError::config(format!("{} is required", key)))
        };

        let image_inference_url = required("IMAGE_INFERENCE_URL")?;
        let api_key = required("INFERENCE_API_KEY")?;
        let audio_inference_url = lookup("AUDIO_INFERENCE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let timeout_secs: u64 = parse_or(&lookup, "INFERENCE_TIMEOUT_SECONDS", 60)?;
        if timeout_secs == 0 {
            return Err(PipelineError::config("INFERENCE_TIMEOUT_SECONDS must be at least 1"));
        }

        let window = SampleWindow::new(
            parse_or(&lookup, "SAMPLE_WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS)?,
            parse_or(&lookup, "SAMPLE_FRAME_COUNT", DEFAULT_FRAME_COUNT)?,
        )
        .map_err(|e| PipelineError::config(e.to_string()))?;

        let bonafide_threshold: f64 =
            parse_or(&lookup, "REALISM_BONAFIDE_THRESHOLD", DEFAULT_BONAFIDE_THRESHOLD)?;
        if !(0.0..=100.0).contains(&bonafide_threshold) {
            return Err(PipelineError::config(
                "REALISM_BONAFIDE_THRESHOLD must be within 0..100",
            ));
        }

        let inference_concurrency: usize = parse_or(&lookup, "INFERENCE_CONCURRENCY", 1)?;
        if inference_concurrency == 0 {
            return Err(PipelineError::config("INFERENCE_CONCURRENCY must be at least 1"));
        }

        Ok(Self {
            image_inference_url,
            audio_inference_url,
            api_key,
            inference_timeout: Duration::from_secs(timeout_secs),
            window,
            bonafide_threshold,
            inference_concurrency,
            inference_max_retries: parse_or(&lookup, "INFERENCE_MAX_RETRIES", 0)?,
        })
    }

    /// Client settings for the image classifier.
    pub fn image_client_config(&self) -> InferenceClientConfig {
        self.client_config(&self.image_inference_url)
    }

    /// Client settings for the audio classifier, if one is configured.
    pub fn audio_client_config(&self) -> Option<InferenceClientConfig> {
        self.audio_inference_url
            .as_deref()
            .map(|url| self.client_config(url))
    }

    fn client_config(&self, url: &str) -> InferenceClientConfig {
        InferenceClientConfig::new(url, self.api_key.clone())
            .with_timeout(self.inference_timeout)
            .with_max_retries(self.inference_max_retries)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> PipelineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|e| PipelineError::config(format!("invalid {} '{}': {}", key, value, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("IMAGE_INFERENCE_URL", "https://models.example.com/frames"),
        ("INFERENCE_API_KEY", "hf_secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.inference_timeout, Duration::from_secs(60));
        assert_eq!(config.window.max_seconds(), 10);
        assert_eq!(config.window.max_frames(), 10);
        assert_eq!(config.bonafide_threshold, 10.0);
        assert_eq!(config.inference_concurrency, 1);
        assert_eq!(config.inference_max_retries, 0);
        assert!(config.audio_client_config().is_none());
        assert!(!format!("{:?}", config).contains("hf_secret"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("AUDIO_INFERENCE_URL", "https://models.example.com/audio"),
            ("INFERENCE_TIMEOUT_SECONDS", "15"),
            ("SAMPLE_WINDOW_SECONDS", "4"),
            ("SAMPLE_FRAME_COUNT", "6"),
            ("REALISM_BONAFIDE_THRESHOLD", "42.5"),
            ("INFERENCE_CONCURRENCY", "3"),
            ("INFERENCE_MAX_RETRIES", "2"),
        ]);
        let config = PipelineConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.window.max_seconds(), 4);
        assert_eq!(config.window.max_frames(), 6);
        assert_eq!(config.bonafide_threshold, 42.5);
        assert_eq!(config.inference_concurrency, 3);

        let audio = config.audio_client_config().unwrap();
        assert_eq!(audio.endpoint_url, "https://models.example.com/audio");
        assert_eq!(audio.timeout, Duration::from_secs(15));
        assert_eq!(audio.max_retries, 2);
    }

    #[test]
    fn test_missing_required_keys() {
        let err = PipelineConfig::from_lookup(lookup(&[("INFERENCE_API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("IMAGE_INFERENCE_URL"));

        let err = PipelineConfig::from_lookup(lookup(&[
            ("IMAGE_INFERENCE_URL", "http://x"),
            ("INFERENCE_API_KEY", "  "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("INFERENCE_API_KEY"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (key, value) in [
            ("SAMPLE_FRAME_COUNT", "0"),
            ("SAMPLE_WINDOW_SECONDS", "ten"),
            ("INFERENCE_TIMEOUT_SECONDS", "0"),
            ("REALISM_BONAFIDE_THRESHOLD", "150"),
            ("INFERENCE_CONCURRENCY", "0"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let result = PipelineConfig::from_lookup(lookup(&pairs));
            assert!(
                matches!(result, Err(PipelineError::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}

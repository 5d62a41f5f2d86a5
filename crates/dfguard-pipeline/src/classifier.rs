//! Remote classifier seam.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use dfguard_ml_client::{InferenceClient, MlResult};

/// Something that classifies one base64 payload and returns raw JSON.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        inputs: &str,
        cancel_rx: Option<watch::Receiver<bool>>,
    ) -> MlResult<Value>;
}

#[async_trait]
impl Classifier for InferenceClient {
    async fn classify(
        &self,
        inputs: &str,
        cancel_rx: Option<watch::Receiver<bool>>,
    ) -> MlResult<Value> {
        match cancel_rx {
            Some(rx) => self.infer_cancellable(inputs, rx).await,
            None => self.infer(inputs).await,
        }
    }
}

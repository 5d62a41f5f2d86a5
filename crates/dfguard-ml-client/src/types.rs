//! Inference request/response types.

use serde::{Deserialize, Serialize};

/// Request body accepted by the inference endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest<'a> {
    /// Base64 payload (PNG frame or audio clip)
    pub inputs: &'a str,
    pub parameters: InferenceParameters,
}

impl<'a> InferenceRequest<'a> {
    pub fn new(inputs: &'a str) -> Self {
        Self {
            inputs,
            parameters: InferenceParameters::default(),
        }
    }
}

/// Model parameters; always sent as an empty object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceParameters {}

/// One `{label, score}` record of a classifier response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

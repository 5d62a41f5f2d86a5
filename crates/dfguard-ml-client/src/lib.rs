//! Client for remote classifier inference endpoints.
//!
//! Each call posts one base64 payload as `{"inputs": ..., "parameters": {}}`
//! with a bearer token and returns the endpoint's raw JSON. Transport,
//! status and parse failures are reported separately so callers can tell a
//! dead service from one that answered with something unusable.

pub mod client;
pub mod error;
pub mod types;

pub use client::{InferenceClient, InferenceClientConfig};
pub use error::{MlError, MlResult};
pub use types::{InferenceParameters, InferenceRequest, LabelScore};

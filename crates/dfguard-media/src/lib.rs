//! Frame extraction for deepfake analysis.
//!
//! This crate provides:
//! - Normalization of raw or base64 media uploads
//! - FFprobe stream inspection and a forward-only FFmpeg frame decoder
//! - Single-pass reservoir sampling bounded by a time window
//! - Lossless PNG + base64 frame encoding for JSON transport

pub mod blob;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod probe;
pub mod sampler;

pub use blob::{sniff_container, MediaBlob};
pub use decoder::{frame_extraction_args, DecodedFrame, FfmpegDecoder, FrameSource, VecFrameSource};
pub use encoder::{encode_frame, encode_png, EncodedFrame};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_stream, StreamInfo};
pub use sampler::{sample_frames, Reservoir, ReservoirSample};

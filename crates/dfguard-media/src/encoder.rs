//! Frame encoding for transport.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage};

use crate::decoder::DecodedFrame;
use crate::error::{MediaError, MediaResult};

/// A sampled frame ready to embed in a JSON request body.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub frame_index: u64,
    pub timestamp_ms: u64,
    /// Size of the PNG before base64
    pub png_len: usize,
    pub base64_png: String,
}

/// Losslessly compress an RGB raster to PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(png)
}

/// Encode a decoded frame as base64 PNG text.
pub fn encode_frame(frame: &DecodedFrame) -> MediaResult<EncodedFrame> {
    let png = encode_png(&frame.image)
        .map_err(|e| MediaError::encode_failed(frame.index, e.to_string()))?;

    Ok(EncodedFrame {
        frame_index: frame.index,
        timestamp_ms: frame.timestamp_ms,
        png_len: png.len(),
        base64_png: STANDARD.encode(&png),
    })
}

//! Uploaded media payloads.
//!
//! Clients send either the raw container bytes or a base64 rendition of them
//! (optionally as a `data:` URI). [`MediaBlob::from_payload`] normalizes both
//! into raw bytes before anything touches a decoder.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Longest filename extension accepted as a decoder hint.
const MAX_EXTENSION_LEN: usize = 8;

/// Raw media bytes plus an optional original filename.
#[derive(Clone)]
pub struct MediaBlob {
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl std::fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBlob")
            .field("len", &self.bytes.len())
            .field("filename", &self.filename)
            .finish()
    }
}

impl MediaBlob {
    /// Normalize an uploaded payload to raw bytes.
    ///
    /// Payloads that start with a known container signature are taken as-is.
    /// Otherwise a payload consisting only of base64 text is decoded. Anything
    /// else is treated as raw bytes and left for the decoder to judge, except a
    /// `data:...;base64,` URI whose body does not decode, which is rejected with
    /// [`MediaError::InvalidPayload`].
    pub fn from_payload(payload: impl Into<Vec<u8>>) -> MediaResult<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(MediaError::EmptyInput);
        }

        if let Some(container) = sniff_container(&payload) {
            debug!(container, len = payload.len(), "Payload carries raw container bytes");
            return Ok(Self::raw(payload));
        }

        let trimmed = payload.trim_ascii();
        if trimmed.is_empty() {
            return Err(MediaError::EmptyInput);
        }

        match decode_base64_payload(trimmed)? {
            Some(decoded) if decoded.is_empty() => Err(MediaError::EmptyInput),
            Some(decoded) => {
                debug!(
                    encoded_len = payload.len(),
                    decoded_len = decoded.len(),
                    "Decoded base64 media payload"
                );
                Ok(Self::raw(decoded))
            }
            None => Ok(Self::raw(payload)),
        }
    }

    fn raw(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: None,
        }
    }

    /// Attach the client-supplied filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        self.filename = (!filename.trim().is_empty()).then_some(filename);
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// File extension to give the decoder, from the filename or the signature.
    pub fn extension_hint(&self) -> Option<String> {
        let from_name = self
            .filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            });

        from_name.or_else(|| sniff_container(&self.bytes).map(str::to_string))
    }

    /// Base64 text of the raw bytes, for JSON transport.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Identify common media containers by their leading bytes.
pub fn sniff_container(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("mp4");
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("webm");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") {
        return match &bytes[8..12] {
            b"AVI " => Some("avi"),
            b"WAVE" => Some("wav"),
            _ => None,
        };
    }
    if bytes.len() > 188 && bytes[0] == 0x47 && bytes[188] == 0x47 {
        return Some("ts");
    }
    if bytes.starts_with(b"FLV") {
        return Some("flv");
    }
    if bytes.starts_with(b"OggS") {
        return Some("ogg");
    }
    if bytes.starts_with(b"fLaC") {
        return Some("flac");
    }
    if bytes.starts_with(b"ID3") || bytes.starts_with(&[0xFF, 0xFB]) {
        return Some("mp3");
    }
    None
}

/// Decode base64 text (optionally a `data:` URI), or `None` if it is not base64.
///
/// A `data:` URI declaring base64 must decode.
fn decode_base64_payload(text: &[u8]) -> MediaResult<Option<Vec<u8>>> {
    let marker = b";base64,";
    let data_uri_body = text.strip_prefix(b"data:").and_then(|rest| {
        rest.windows(marker.len())
            .position(|w| w == marker)
            .map(|pos| &rest[pos + marker.len()..])
    });

    match data_uri_body {
        Some(body) => decode_base64_text(body).map(Some).ok_or_else(|| {
            MediaError::InvalidPayload("data URI body is not valid base64".to_string())
        }),
        None => Ok(decode_base64_text(text)),
    }
}

fn decode_base64_text(body: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let is_alphabet = compact
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_' | b'='));
    if !is_alphabet {
        return None;
    }

    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(&compact).ok())
}

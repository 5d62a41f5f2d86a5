//! Forward-only frame decoding.
//!
//! [`FfmpegDecoder`] spills the uploaded container to a temp file, probes it,
//! and pipes packed RGB24 frames out of an FFmpeg child one frame at a time.
//! The stream is never seeked: seeking on inter-frame codecs such as VP9 can
//! hand back corrupt frames, so frames are read sequentially from the start
//! until the sampling window closes or the stream ends.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dfguard_models::SampleWindow;

use crate::blob::MediaBlob;
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_stream, StreamInfo};

/// Upper bound on FFmpeg stderr retained for diagnostics.
const MAX_STDERR_BYTES: usize = 8 * 1024;

/// One decoded raster frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Zero-based index in decode order
    pub index: u64,
    /// Playback offset in milliseconds
    pub timestamp_ms: u64,
    pub image: RgbImage,
}

/// Lazy, forward-only sequence of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>>;
}

/// Frame source over frames that are already decoded.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: std::collections::VecDeque<DecodedFrame>,
}

impl VecFrameSource {
    pub fn new(frames: impl IntoIterator<Item = DecodedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

#[async_trait]
impl FrameSource for VecFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// FFmpeg-backed frame source over an in-memory media blob.
///
/// The temp file and the child process live exactly as long as the decoder;
/// dropping it removes the file and kills FFmpeg.
pub struct FfmpegDecoder {
    info: StreamInfo,
    window: SampleWindow,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    cancel_rx: Option<watch::Receiver<bool>>,
    next_index: u64,
    finished: bool,
    _input: NamedTempFile,
}

impl FfmpegDecoder {
    /// Open a decoder over `blob`, reading at most `window.max_seconds()` of video.
    pub async fn open(blob: &MediaBlob, window: SampleWindow) -> MediaResult<Self> {
        if blob.is_empty() {
            return Err(MediaError::EmptyInput);
        }

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let suffix = blob
            .extension_hint()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let input = tempfile::Builder::new()
            .prefix("dfguard-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(input.path(), blob.as_bytes()).await?;

        let info = probe_stream(input.path()).await?;
        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            codec = %info.codec,
            "Opened video stream"
        );

        let args = frame_extraction_args(input.path(), window, info.fps);
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::decode_failed("Failed to capture FFmpeg stdout", None))?;
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_stderr(stderr)));

        Ok(Self {
            info,
            window,
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            cancel_rx: None,
            next_index: 0,
            finished: false,
            _input: input,
        })
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Stream information from the probe.
    pub fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    /// Stop FFmpeg and surface a decode failure if nothing was produced.
    async fn finish(&mut self) -> MediaResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // Early exit at the window edge leaves FFmpeg mid-stream.
        let _ = self.child.start_kill();
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if self.next_index == 0 && !status.success() {
            return Err(MediaError::decode_failed(
                "FFmpeg produced no frames",
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        debug!(frames = self.next_index, "Frame extraction finished");
        Ok(())
    }

    async fn read_frame(&mut self) -> MediaResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.info.rgb24_frame_len()];
        let filled = read_full(&mut self.stdout, &mut buf).await?;

        if filled == buf.len() {
            Ok(Some(buf))
        } else {
            if filled > 0 {
                warn!(
                    expected = buf.len(),
                    got = filled,
                    "Discarding truncated trailing frame"
                );
            }
            Ok(None)
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegDecoder {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        let timestamp_ms = self.info.timestamp_ms(self.next_index);
        if !self.window.contains(timestamp_ms) {
            self.finish().await?;
            return Ok(None);
        }

        let mut cancel_rx = self.cancel_rx.clone();
        let read = tokio::select! {
            read = self.read_frame() => read?,
            _ = cancelled(&mut cancel_rx) => {
                info!("Frame extraction cancelled, killing FFmpeg");
                let _ = self.child.start_kill();
                self.finished = true;
                return Err(MediaError::Cancelled);
            }
        };

        let Some(pixels) = read else {
            self.finish().await?;
            return Ok(None);
        };

        let image = RgbImage::from_raw(self.info.width, self.info.height, pixels)
            .ok_or_else(|| MediaError::decode_failed("Frame buffer does not match stream size", None))?;

        let frame = DecodedFrame {
            index: self.next_index,
            timestamp_ms,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}

/// FFmpeg arguments that decode the first video stream to packed RGB24 on stdout.
pub fn frame_extraction_args(input: &Path, window: SampleWindow, fps: f64) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        // Keep the probed dimensions; autorotation would swap them.
        "-noautorotate",
        "-t",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(window.max_seconds().to_string());
    args.push("-i".to_string());
    args.push(input.to_string_lossy().to_string());
    args.extend(["-map", "0:v:0", "-an", "-sn"].iter().map(|s| s.to_string()));
    // Output cadence must match the probed rate that timestamps are derived from.
    args.push("-vf".to_string());
    args.push(format!("fps={}", fps));
    args.extend(
        ["-pix_fmt", "rgb24", "-f", "rawvideo", "pipe:1"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn collect_stderr<R: AsyncRead + Unpin>(stderr: R) -> String {
    let mut collected = Vec::new();
    let mut reader = BufReader::new(stderr);
    let mut chunk = [0u8; 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_STDERR_BYTES.saturating_sub(collected.len());
                collected.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&collected).trim().to_string()
}

/// Resolves once the cancel flag is set; never resolves without a receiver.
async fn cancelled(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(rx) => loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending::<()>().await,
    }
}

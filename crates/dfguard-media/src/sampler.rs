//! Bounded reservoir sampling over a frame stream.
//!
//! Frames are consumed in a single forward pass. The first `max_frames` frames
//! fill the reservoir; the i-th frame after that (1-indexed) replaces slot `j`
//! when a uniform draw `j` in `[0, i)` lands inside the reservoir. Every frame
//! seen so far is therefore present with probability `min(1, max_frames / i)`,
//! and memory stays bounded by `max_frames` regardless of video length.

use rand::Rng;
use tracing::debug;

use dfguard_models::SampleWindow;

use crate::decoder::{DecodedFrame, FrameSource};
use crate::error::{MediaError, MediaResult};

/// Fixed-capacity uniform sample of a stream of unknown length.
#[derive(Debug)]
pub struct Reservoir<T, R> {
    capacity: usize,
    items: Vec<T>,
    seen: u64,
    rng: R,
}

impl<T, R: Rng> Reservoir<T, R> {
    /// Create an empty reservoir. A zero capacity keeps nothing.
    pub fn new(capacity: usize, rng: R) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
            seen: 0,
            rng,
        }
    }

    /// Offer the next stream element.
    pub fn offer(&mut self, item: T) {
        self.seen += 1;

        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }

        let slot = self.rng.random_range(0..self.seen);
        if slot < self.capacity as u64 {
            self.items[slot as usize] = item;
        }
    }

    /// Number of elements offered so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Freeze the sample. Order is unspecified.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Frozen frame sample, ascending by frame index.
#[derive(Debug)]
pub struct ReservoirSample {
    pub frames: Vec<DecodedFrame>,
    /// Frames inside the window that were offered to the reservoir
    pub frames_seen: u64,
}

impl ReservoirSample {
    pub fn indices(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.index).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Drain `source` up to the window edge and keep a uniform sample of its frames.
///
/// Fails with [`MediaError::NoFramesAvailable`] when no frame falls inside the window.
pub async fn sample_frames<S, R>(
    source: &mut S,
    window: SampleWindow,
    rng: R,
) -> MediaResult<ReservoirSample>
where
    S: FrameSource + ?Sized,
    R: Rng + Send,
{
    let mut reservoir = Reservoir::new(window.max_frames(), rng);

    while let Some(frame) = source.next_frame().await? {
        if !window.contains(frame.timestamp_ms) {
            debug!(
                frame_index = frame.index,
                timestamp_ms = frame.timestamp_ms,
                "Sampling window closed"
            );
            break;
        }
        reservoir.offer(frame);
    }

    if reservoir.seen() == 0 {
        return Err(MediaError::NoFramesAvailable {
            seconds_window: window.max_seconds(),
        });
    }

    let frames_seen = reservoir.seen();
    let mut frames = reservoir.into_items();
    frames.sort_by_key(|f| f.index);

    debug!(
        frames_seen,
        kept = frames.len(),
        "Reservoir sample frozen"
    );

    Ok(ReservoirSample {
        frames,
        frames_seen,
    })
}

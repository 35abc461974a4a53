//! Fixed-size audio frame pulled from the runtime.

use std::time::Duration;

use crate::config::{RenderSettings, FRAME_SAMPLES};

/// One 10ms buffer of decoded render data.
///
/// The storage is always [`FRAME_SAMPLES`] long; `len` counts how many of
/// those samples the last read actually filled. Only the filled prefix is
/// ever written to a sink.
///
/// # Example
///
/// ```
/// use render_drain::SampleFrame;
///
/// let mut frame = SampleFrame::new();
/// frame.buffer_mut()[..3].copy_from_slice(&[1, 2, 3]);
/// frame.set_len(3);
/// assert_eq!(frame.samples(), &[1, 2, 3]);
/// assert_eq!(frame.to_le_bytes(), vec![1, 0, 2, 0, 3, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct SampleFrame {
    buffer: [i16; FRAME_SAMPLES],
    len: usize,
}

impl SampleFrame {
    /// Creates an empty frame.
    pub fn new() -> Self {
        Self {
            buffer: [0; FRAME_SAMPLES],
            len: 0,
        }
    }

    /// Whole backing storage, for a source to read into.
    pub fn buffer_mut(&mut self) -> &mut [i16] {
        &mut self.buffer
    }

    /// Records how many samples the last read produced. Clamped to capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(FRAME_SAMPLES);
    }

    /// The filled samples.
    pub fn samples(&self) -> &[i16] {
        &self.buffer[..self.len]
    }

    /// Number of filled samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the last read produced nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum samples a frame holds.
    pub const fn capacity() -> usize {
        FRAME_SAMPLES
    }

    /// Duration of the filled samples in the given format.
    pub fn duration(&self, settings: &RenderSettings) -> Duration {
        settings.duration_of(self.len)
    }

    /// Filled samples encoded as 16-bit little-endian PCM.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        encode_le(self.samples())
    }
}

impl Default for SampleFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes samples as interleaved 16-bit little-endian PCM.
pub(crate) fn encode_le(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

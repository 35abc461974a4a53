//! Scripted render source for testing without a runtime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::RenderSource;

/// A render source that answers reads from a script.
///
/// Each queued entry is returned by one read (truncated to the read buffer).
/// Once the script runs out every read returns zero, which the drain treats
/// as "nothing ready".
///
/// # Example
///
/// ```
/// use render_drain::runtime::{MockRenderSource, RenderSource};
///
/// let source = MockRenderSource::new();
/// source.push_read(vec![1, 2, 3]);
/// source.push_empty_read();
///
/// let mut buf = [0i16; 160];
/// assert_eq!(source.read_render_data(&mut buf), 3);
/// assert_eq!(source.read_render_data(&mut buf), 0);
/// assert_eq!(source.reads(), 2);
/// ```
#[derive(Default)]
pub struct MockRenderSource {
    script: Mutex<VecDeque<Vec<i16>>>,
    reads: AtomicUsize,
}

impl MockRenderSource {
    /// Creates a source with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that returns `reads` in order.
    pub fn with_reads(reads: impl IntoIterator<Item = Vec<i16>>) -> Self {
        let source = Self::new();
        for read in reads {
            source.push_read(read);
        }
        source
    }

    /// Queues one read returning `samples`.
    pub fn push_read(&self, samples: Vec<i16>) {
        self.script.lock().push_back(samples);
    }

    /// Queues one read returning nothing.
    pub fn push_empty_read(&self) {
        self.push_read(Vec::new());
    }

    /// Reads still queued.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    /// Reads served so far, including empty ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RenderSource for MockRenderSource {
    fn read_render_data(&self, buf: &mut [i16]) -> usize {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let Some(samples) = self.script.lock().pop_front() else {
            return 0;
        };
        let n = samples.len().min(buf.len());
        buf[..n].copy_from_slice(&samples[..n]);
        n
    }
}

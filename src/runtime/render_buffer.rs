//! Ring buffer between the runtime's decoder and the drain.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

use super::RenderSource;

/// Creates a ring buffer pair holding up to `capacity` samples.
///
/// Returns the producer (filled by the runtime) and the source the drain
/// pulls from.
pub fn render_buffer(capacity: usize) -> (RenderProducer, RingRenderSource) {
    let ring_buffer = HeapRb::<i16>::new(capacity.max(1));
    let (producer, consumer) = ring_buffer.split();

    (
        RenderProducer {
            producer,
            dropped_samples: 0,
        },
        RingRenderSource {
            consumer: Mutex::new(consumer),
        },
    )
}

/// Writing half of a render buffer.
pub struct RenderProducer {
    producer: ringbuf::HeapProd<i16>,
    dropped_samples: u64,
}

impl RenderProducer {
    /// Pushes as many samples as fit and returns that count.
    ///
    /// Samples that don't fit are dropped and counted; the buffer never
    /// blocks the decoder.
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            let dropped = (samples.len() - pushed) as u64;
            self.dropped_samples += dropped;
            tracing::trace!(dropped, "render buffer full");
        }
        pushed
    }

    /// Total samples dropped because the buffer was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}

/// Reading half of a render buffer.
///
/// The consumer sits behind a mutex so the source can be shared as
/// `Arc<dyn RenderSource>`; only the drain thread reads in practice.
pub struct RingRenderSource {
    consumer: Mutex<ringbuf::HeapCons<i16>>,
}

impl RingRenderSource {
    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.consumer.lock().occupied_len()
    }
}

impl RenderSource for RingRenderSource {
    fn read_render_data(&self, buf: &mut [i16]) -> usize {
        self.consumer.lock().pop_slice(buf)
    }
}

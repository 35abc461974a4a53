//! Sink trait and implementations for drained audio.
//!
//! A [`Sink`] is any destination that can receive render data. The crate
//! provides three built-in sinks:
//!
//! - [`PcmFileSink`]: headerless 16-bit little-endian PCM, the default output
//! - [`WavFileSink`]: the same samples behind a WAV header
//! - [`ChannelSink`]: forwards each frame to a tokio mpsc channel
//!
//! Sinks are driven from the drain worker thread, so every method is
//! synchronous and may block.

mod channel;
mod file;

pub use channel::ChannelSink;
pub use file::{PcmFileSink, WavFileSink};

use crate::SinkError;

/// A destination for drained audio.
///
/// # Implementation Notes
///
/// - `write` receives only the filled part of a frame, never an empty slice
/// - `on_start` runs each time the renderer starts, before the first write
/// - `flush` runs after each renderer stop, once the worker is joined
/// - `on_stop` runs once when the owning drain is closed; finalize here
///
/// # Example
///
/// ```
/// use render_drain::{Sink, SinkError};
///
/// struct CountingSink {
///     samples: usize,
/// }
///
/// impl Sink for CountingSink {
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
///         self.samples += samples.len();
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called each time the renderer starts.
    ///
    /// Default implementation does nothing.
    fn on_start(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Writes one frame's worth of samples, in full.
    ///
    /// Errors are recoverable: the drain reports them and moves on to the
    /// next frame.
    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError>;

    /// Pushes buffered data to its destination.
    ///
    /// Default implementation does nothing.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once when the drain is closed.
    ///
    /// Default implementation flushes.
    fn on_stop(&mut self) -> Result<(), SinkError> {
        self.flush()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&mut self) -> Result<(), SinkError> {
        (**self).on_start()
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        (**self).write(samples)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        (**self).on_stop()
    }
}

//! Custom audio device registered with the media runtime.

use std::sync::Arc;

use crate::config::RenderSettings;
use crate::drain::{DrainStats, RenderDrain};
use crate::runtime::{AudioDeviceCallbacks, RenderSource, Unsupported};
use crate::DrainError;

/// Audio device that renders by draining the runtime into a sink.
///
/// Translates the runtime's renderer hooks into [`RenderDrain`] calls. The
/// device is the single owner of the drain; the runtime only holds it as
/// `Arc<dyn AudioDeviceCallbacks>` and the drain only borrows the render
/// source. Dropping the device joins any running worker.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use render_drain::runtime::{LoopbackRuntime, MediaRuntime};
/// use render_drain::{AudioDevice, DrainConfig, PcmFileSink, RenderDrain};
///
/// let runtime = LoopbackRuntime::init(440.0)?;
/// let sink = PcmFileSink::create("audio_out.pcm")?;
/// let device = Arc::new(AudioDevice::new(
///     runtime.render_source(),
///     RenderDrain::new(sink, DrainConfig::default()),
/// ));
/// runtime.set_audio_device(device.clone())?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AudioDevice {
    source: Arc<dyn RenderSource>,
    drain: RenderDrain,
}

impl AudioDevice {
    /// Creates a device that will drain `source` with `drain`.
    pub fn new(source: Arc<dyn RenderSource>, drain: RenderDrain) -> Self {
        Self { source, drain }
    }

    /// The drain behind this device.
    pub fn drain(&self) -> &RenderDrain {
        &self.drain
    }

    /// Stops rendering if the runtime hasn't already, and finalizes the sink.
    pub fn close(&self) -> Result<DrainStats, DrainError> {
        self.drain.close()
    }
}

impl AudioDeviceCallbacks for AudioDevice {
    fn start_renderer(&self) -> bool {
        tracing::info!("starting audio renderer");
        match self.drain.start(Arc::clone(&self.source)) {
            Ok(()) => {
                tracing::info!("started audio renderer");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start audio renderer");
                false
            }
        }
    }

    fn destroy_renderer(&self) -> bool {
        match self.drain.stop() {
            Ok(stats) => {
                tracing::info!(
                    frames = stats.frames_written,
                    samples = stats.samples_written,
                    "audio renderer destroyed"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to destroy audio renderer");
                false
            }
        }
    }

    fn get_render_settings(&self) -> Result<RenderSettings, Unsupported> {
        Ok(RenderSettings::MONO_16KHZ)
    }
}

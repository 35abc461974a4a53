//! The sample application: join a session and record what it renders.

use std::sync::Arc;

use crate::config::{AppConfig, OutputFormat, RenderSettings};
use crate::device::AudioDevice;
use crate::drain::{DrainStats, RenderDrain};
use crate::event::{event_callback, DrainEvent};
use crate::runtime::{LoopbackRuntime, MediaRuntime, MediaSession};
use crate::session::{SessionController, SessionStats};
use crate::shutdown::ShutdownSignal;
use crate::sink::{PcmFileSink, Sink, WavFileSink};
use crate::{ConfigError, DrainError, RuntimeError, SinkError};

/// Errors that end the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The runtime, device registration or session setup failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The output file could not be opened.
    #[error("could not open output: {0}")]
    Sink(#[from] SinkError),

    /// The drain failed while shutting down.
    #[error(transparent)]
    Drain(#[from] DrainError),

    /// The teardown task did not complete.
    #[error("teardown task failed: {0}")]
    Teardown(#[from] tokio::task::JoinError),
}

/// What a completed run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppReport {
    /// Drain counters at shutdown.
    pub drain: DrainStats,
    /// Session counters at shutdown.
    pub session: SessionStats,
    /// Samples the runtime discarded because the drain fell behind.
    pub dropped_samples: u64,
}

/// Runs until `shutdown` is requested, then tears down in order:
/// disconnect, destroy the renderer, finalize the output, shut the
/// runtime down.
///
/// # Errors
///
/// Startup failures (runtime init, output file, device registration,
/// session creation, connect) are returned before waiting. Session errors
/// reported later through callbacks are only logged.
pub async fn run(config: AppConfig, shutdown: ShutdownSignal) -> Result<AppReport, AppError> {
    let runtime = LoopbackRuntime::init(config.tone_hz)?;

    if config.runtime_logging {
        runtime.enable_logging(Arc::new(|line: &str| {
            tracing::debug!(target: "media_runtime", "{line}");
        }));
    }

    let sink = open_sink(&config)?;
    let drain = RenderDrain::new(sink, config.drain.clone())
        .with_event_callback(event_callback(log_drain_event));
    let device = Arc::new(AudioDevice::new(runtime.render_source(), drain));
    runtime.set_audio_device(device.clone())?;

    let controller = Arc::new(SessionController::new());
    let session = runtime.new_session(&config.credentials, controller.clone())?;
    session.connect(&config.credentials.token)?;

    tracing::info!(
        session_id = %config.credentials.session_id,
        output = %config.output_path.display(),
        format = ?config.output_format,
        "connecting; press Ctrl-C to stop"
    );

    shutdown.wait().await;
    tracing::info!("shutting down");

    // Teardown joins threads; keep it off the async workers
    let report = tokio::task::spawn_blocking(move || {
        teardown(&runtime, session, &controller, &device)
    })
    .await??;

    tracing::info!(
        frames = report.drain.frames_written,
        samples = report.drain.samples_written,
        write_errors = report.drain.write_errors,
        dropped_samples = report.dropped_samples,
        "done"
    );
    Ok(report)
}

fn open_sink(config: &AppConfig) -> Result<Box<dyn Sink>, SinkError> {
    Ok(match config.output_format {
        OutputFormat::RawPcm => Box::new(PcmFileSink::create(&config.output_path)?),
        OutputFormat::Wav => Box::new(WavFileSink::create(
            &config.output_path,
            RenderSettings::MONO_16KHZ,
        )?),
    })
}

fn teardown(
    runtime: &LoopbackRuntime,
    session: Arc<dyn MediaSession>,
    controller: &SessionController,
    device: &AudioDevice,
) -> Result<AppReport, AppError> {
    if controller.is_connected() {
        if let Err(e) = session.disconnect() {
            tracing::warn!(error = %e, "disconnect failed");
        }
    }
    drop(session);

    let drain = device.close()?;
    let dropped_samples = runtime.dropped_samples();
    runtime.shutdown();

    Ok(AppReport {
        drain,
        session: controller.stats(),
        dropped_samples,
    })
}

fn log_drain_event(event: DrainEvent) {
    match event {
        DrainEvent::RendererStarted => tracing::debug!("renderer started"),
        DrainEvent::RendererStopped { stats } => {
            tracing::debug!(frames = stats.frames_written, "renderer stopped");
        }
        DrainEvent::SinkError { sink_name, error } => {
            tracing::warn!(sink = %sink_name, %error, "frame dropped");
        }
    }
}

//! Joins a session and writes the received audio to a raw PCM file.
//!
//! Configuration comes from the environment:
//!
//! - `SESSION_API_KEY`, `SESSION_ID`, `SESSION_TOKEN`: credentials
//! - `RENDER_DRAIN_OUTPUT`: output path (default `audio_out.pcm`)
//! - `RENDER_DRAIN_FORMAT`: `pcm` or `wav`
//! - `RENDER_DRAIN_RUNTIME_LOG`: forward runtime log lines
//! - `RENDER_DRAIN_TONE_HZ`: tone sent by the loopback participant
//! - `RUST_LOG`: log filter (default `info`)
//!
//! Play the result with `ffplay -f s16le -ar 16000 -ac 1 audio_out.pcm`.

use std::process::ExitCode;

use render_drain::{app, listen_for_interrupt, AppConfig, AppError, AppReport, ShutdownSignal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(report) => {
            println!(
                "Wrote {} samples ({} frames)",
                report.drain.samples_written, report.drain.frames_written
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "render-drain failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<AppReport, AppError> {
    let config = AppConfig::from_env()?;

    let shutdown = ShutdownSignal::new();
    let _interrupt = listen_for_interrupt(shutdown.clone());

    app::run(config, shutdown).await
}

//! # render-drain
//!
//! Records the audio a real-time media runtime renders for a session.
//!
//! The runtime decodes remote audio into an internal buffer and exposes it
//! through a pull API ([`RenderSource`](runtime::RenderSource)). This crate
//! registers a custom audio device whose renderer is a [`RenderDrain`]: a
//! dedicated thread that pulls one 10ms frame (160 samples at 16kHz mono)
//! every 10ms and hands it to a [`Sink`], by default a headerless 16-bit
//! little-endian PCM file.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use render_drain::runtime::MockRenderSource;
//! use render_drain::{ChannelSink, DrainConfig, RenderDrain};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel::<Vec<i16>>(32);
//! let drain = RenderDrain::new(ChannelSink::new(tx), DrainConfig::default());
//!
//! let source = Arc::new(MockRenderSource::with_reads([vec![7; 160]]));
//! drain.start(source)?;
//! assert_eq!(rx.blocking_recv().unwrap(), vec![7; 160]);
//! drain.stop()?;
//! # Ok::<(), render_drain::DrainError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Runtime threads**: decode audio into the render buffer and deliver
//!   session callbacks to [`SessionController`]
//! - **Drain worker**: polls the render buffer on a fixed cadence and writes
//!   whatever was read; an empty read is skipped, never an error
//! - **Main task**: waits for Ctrl-C via [`ShutdownSignal`], then tears the
//!   session down on a blocking thread
//!
//! Starting and stopping the worker is driven by the runtime through
//! [`AudioDevice`]'s renderer hooks. `destroy_renderer` returns only after
//! the worker thread has been joined.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod app;
mod config;
mod device;
mod drain;
mod error;
mod event;
mod frame;
pub mod runtime;
mod session;
mod shutdown;
mod sink;

pub use app::{AppError, AppReport};
pub use config::{
    AppConfig, ConfigError, Credentials, DrainConfig, OutputFormat, RenderSettings,
    DEFAULT_OUTPUT_PATH, FRAME_SAMPLES,
};
pub use device::AudioDevice;
pub use drain::{DrainStats, RenderDrain};
pub use error::{DrainError, RuntimeError, SinkError};
pub use event::{event_callback, DrainEvent, EventCallback};
pub use frame::SampleFrame;
pub use session::{SessionController, SessionStats, SubscriberLogger};
pub use shutdown::{listen_for_interrupt, ShutdownSignal, FORCED_EXIT_CODE};
pub use sink::{ChannelSink, PcmFileSink, Sink, WavFileSink};

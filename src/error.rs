//! Error types for render-drain.
//!
//! Errors are split by who can recover from them:
//! - **Fatal errors** ([`DrainError`], [`RuntimeError`]): the renderer or
//!   session cannot start
//! - **Recoverable errors** ([`SinkError`]): a single frame could not be
//!   persisted; surfaced via [`EventCallback`](crate::EventCallback) while
//!   the drain keeps running

use std::path::PathBuf;

/// Errors returned by [`RenderDrain`](crate::RenderDrain) lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    /// `start` was called while a worker is already running.
    #[error("render drain is already running")]
    AlreadyRunning,

    /// `start` was called after the sink was finalized.
    #[error("render drain is closed")]
    Closed,

    /// The OS refused to create the worker thread.
    #[error("failed to spawn drain worker: {source}")]
    WorkerSpawn {
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The worker thread panicked before it could be joined cleanly.
    #[error("drain worker panicked")]
    WorkerPanicked,

    /// The sink failed to start or to flush at shutdown.
    #[error("sink '{sink_name}' failed: {source}")]
    Sink {
        /// Name of the failing sink.
        sink_name: String,
        /// The underlying sink error.
        #[source]
        source: SinkError,
    },
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
///
/// Write errors are recoverable: the drain emits a
/// [`DrainEvent::SinkError`](crate::DrainEvent::SinkError), drops the frame
/// and keeps polling.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The sink was already finalized.
    #[error("sink closed")]
    Closed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by a [`MediaRuntime`](crate::runtime::MediaRuntime).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime library could not be initialized.
    #[error("could not initialize media runtime: {reason}")]
    InitFailed {
        /// Why initialization failed.
        reason: String,
    },

    /// The custom audio device could not be registered.
    #[error("could not register audio device: {reason}")]
    DeviceRegistration {
        /// Why registration failed.
        reason: String,
    },

    /// The session object could not be created.
    #[error("could not create session: {reason}")]
    SessionCreate {
        /// Why creation failed.
        reason: String,
    },

    /// The runtime could not begin connecting.
    #[error("could not connect session {session_id}: {reason}")]
    ConnectFailed {
        /// Session that failed to connect.
        session_id: String,
        /// Why connecting failed.
        reason: String,
    },

    /// Subscribing to a stream failed. Non-fatal for the session.
    #[error("could not subscribe to stream {stream_id}: {reason}")]
    Subscribe {
        /// Stream that could not be subscribed.
        stream_id: String,
        /// Why the subscribe failed.
        reason: String,
    },

    /// An operation required a connected session.
    #[error("session {session_id} is not connected")]
    NotConnected {
        /// Session the operation targeted.
        session_id: String,
    },
}

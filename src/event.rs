//! Runtime events for monitoring the render drain.
//!
//! Events are non-fatal notifications. The drain keeps running after any
//! event is emitted; they exist for logging and metrics, not control flow.

use std::sync::Arc;

use crate::drain::DrainStats;

/// Events emitted by a [`RenderDrain`](crate::RenderDrain).
///
/// # Example
///
/// ```
/// use render_drain::DrainEvent;
///
/// fn handle_event(event: DrainEvent) {
///     match event {
///         DrainEvent::RendererStarted => eprintln!("renderer started"),
///         DrainEvent::RendererStopped { stats } => {
///             eprintln!("renderer stopped after {} frames", stats.frames_written);
///         }
///         DrainEvent::SinkError { sink_name, error } => {
///             eprintln!("sink '{}' error: {}", sink_name, error);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum DrainEvent {
    /// The worker thread is running.
    RendererStarted,

    /// The worker thread was joined.
    RendererStopped {
        /// Counters at the time of the join.
        stats: DrainStats,
    },

    /// A frame could not be written and was dropped.
    ///
    /// The drain continues with the next frame.
    SinkError {
        /// Name of the sink that errored.
        sink_name: String,
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving drain events.
///
/// Invoked from the drain worker thread for [`DrainEvent::SinkError`] and
/// from the caller of `start`/`stop` for lifecycle events.
pub type EventCallback = Arc<dyn Fn(DrainEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use render_drain::{event_callback, DrainEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(DrainEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

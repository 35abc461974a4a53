//! Boundary to the external media runtime.
//!
//! The runtime owns sessions, streams and subscribers, decodes incoming
//! audio and calls back into the application. This module describes exactly
//! the surface the application consumes:
//!
//! - [`MediaRuntime`]: process-level entry point (device registration,
//!   logging, session creation)
//! - [`MediaSession`] + [`SessionObserver`]: session control and callbacks
//! - [`Subscriber`] + [`SubscriberObserver`]: per-stream consumers
//! - [`AudioDeviceCallbacks`]: the three renderer hooks the runtime invokes
//! - [`RenderSource`]: the pull API for decoded audio
//!
//! Observers are passed as `Arc<dyn Trait>` so callbacks arrive with their
//! typed context already bound.

mod loopback;
mod mock;
mod render_buffer;
mod tone;

pub use loopback::{LoopbackRuntime, LoopbackSession};
pub use mock::MockRenderSource;
pub use render_buffer::{render_buffer, RenderProducer, RingRenderSource};
pub use tone::ToneGenerator;

use std::sync::Arc;

use crate::config::{Credentials, RenderSettings};
use crate::RuntimeError;

/// Pull API for decoded render data.
///
/// Implementations are filled asynchronously by the runtime and drained by
/// a [`RenderDrain`](crate::RenderDrain).
pub trait RenderSource: Send + Sync {
    /// Copies up to `buf.len()` samples into `buf` and returns how many were
    /// copied. Zero means nothing is ready yet; it is not an error.
    fn read_render_data(&self, buf: &mut [i16]) -> usize;
}

/// Returned by [`AudioDeviceCallbacks::get_render_settings`] when the device
/// cannot render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("capability not supported by this audio device")]
pub struct Unsupported;

/// Renderer hooks of a custom audio device.
///
/// The runtime calls these at its own discretion, typically while setting up
/// and tearing down a subscription. Exactly these three entry points exist.
pub trait AudioDeviceCallbacks: Send + Sync {
    /// Starts rendering. Returns `false` if the renderer could not start.
    fn start_renderer(&self) -> bool;

    /// Stops rendering and releases renderer resources. Blocks until the
    /// renderer has fully stopped.
    fn destroy_renderer(&self) -> bool;

    /// Reports the format the device renders. Must answer synchronously.
    fn get_render_settings(&self) -> Result<RenderSettings, Unsupported>;
}

/// Sink for the runtime's own diagnostic log lines.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A participant connection inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection identifier.
    pub id: String,
}

/// A remote participant's published stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Stream identifier.
    pub id: String,
    /// Connection publishing the stream.
    pub connection_id: String,
    /// Whether the stream carries audio.
    pub has_audio: bool,
    /// Whether the stream carries video.
    pub has_video: bool,
}

/// Metadata of a decoded video frame delivered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Presentation timestamp in milliseconds since subscription.
    pub timestamp_ms: u64,
}

/// Reasons a session reports through [`SessionObserver::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// The token was rejected.
    AuthorizationFailure,
    /// The network connection could not be established or was lost.
    ConnectionFailed,
    /// The session identifier is not valid.
    InvalidSession,
    /// An internal runtime failure.
    Internal,
}

/// Reasons a subscriber reports through [`SubscriberObserver::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberErrorCode {
    /// The audio renderer failed to start.
    RendererFailed,
    /// The stream went away while subscribing.
    StreamNotFound,
    /// An internal runtime failure.
    Internal,
}

/// Session callbacks. Invoked from runtime threads.
#[allow(unused_variables)]
pub trait SessionObserver: Send + Sync {
    /// The session is connected.
    fn on_connected(&self, session: &dyn MediaSession);

    /// A participant joined.
    fn on_connection_created(&self, session: &dyn MediaSession, connection: &ConnectionInfo) {}

    /// A participant left.
    fn on_connection_dropped(&self, session: &dyn MediaSession, connection: &ConnectionInfo) {}

    /// A remote stream is available for subscription.
    fn on_stream_received(&self, session: &dyn MediaSession, stream: &StreamInfo);

    /// A remote stream went away.
    fn on_stream_dropped(&self, session: &dyn MediaSession, stream: &StreamInfo) {}

    /// The session is disconnected.
    fn on_disconnected(&self, session: &dyn MediaSession);

    /// The session hit an error. No automatic retry follows.
    fn on_error(&self, session: &dyn MediaSession, message: &str, code: SessionErrorCode);
}

/// Control surface handed to subscriber callbacks.
pub trait SubscriberControl: Send + Sync {
    /// Stream this subscriber consumes.
    fn stream_id(&self) -> &str;

    /// Enables or disables video for this subscriber.
    fn set_subscribe_to_video(&self, enabled: bool);
}

/// Subscriber callbacks. Invoked from runtime threads.
#[allow(unused_variables)]
pub trait SubscriberObserver: Send + Sync {
    /// The subscriber is receiving media.
    fn on_connected(&self, subscriber: &dyn SubscriberControl, stream: &StreamInfo);

    /// A decoded video frame is available.
    fn on_render_frame(&self, subscriber: &dyn SubscriberControl, frame: &VideoFrame) {}

    /// The subscriber hit an error.
    fn on_error(&self, subscriber: &dyn SubscriberControl, message: &str, code: SubscriberErrorCode);
}

/// A request to consume one remote stream.
pub struct Subscriber {
    stream: StreamInfo,
    subscribe_to_video: bool,
    observer: Arc<dyn SubscriberObserver>,
}

impl Subscriber {
    /// Creates a subscriber for `stream`. Video is enabled by default.
    pub fn new(stream: StreamInfo, observer: Arc<dyn SubscriberObserver>) -> Self {
        Self {
            stream,
            subscribe_to_video: true,
            observer,
        }
    }

    /// Enables or disables video before subscribing.
    pub fn set_subscribe_to_video(&mut self, enabled: bool) {
        self.subscribe_to_video = enabled;
    }

    /// Whether video will be requested.
    pub fn subscribe_to_video(&self) -> bool {
        self.subscribe_to_video
    }

    /// Stream this subscriber targets.
    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// Callbacks for this subscriber.
    pub fn observer(&self) -> &Arc<dyn SubscriberObserver> {
        &self.observer
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("stream", &self.stream)
            .field("subscribe_to_video", &self.subscribe_to_video)
            .finish_non_exhaustive()
    }
}

/// A real-time session.
pub trait MediaSession: Send + Sync {
    /// Session identifier.
    fn id(&self) -> &str;

    /// Starts connecting. Completion is reported via
    /// [`SessionObserver::on_connected`] or [`SessionObserver::on_error`].
    fn connect(&self, token: &str) -> Result<(), RuntimeError>;

    /// Subscribes to a received stream.
    fn subscribe(&self, subscriber: Subscriber) -> Result<(), RuntimeError>;

    /// Disconnects, stopping every subscription. Callbacks for the teardown
    /// run on the calling thread before this returns.
    fn disconnect(&self) -> Result<(), RuntimeError>;
}

/// Process-level entry point of a media runtime.
pub trait MediaRuntime: Send + Sync {
    /// Registers the custom audio device. Must happen before any session is
    /// created.
    fn set_audio_device(&self, device: Arc<dyn AudioDeviceCallbacks>) -> Result<(), RuntimeError>;

    /// Routes the runtime's own log lines to `callback`.
    fn enable_logging(&self, callback: LogCallback);

    /// Where decoded render data can be pulled from.
    fn render_source(&self) -> Arc<dyn RenderSource>;

    /// Creates a session bound to `observer`.
    fn new_session(
        &self,
        credentials: &Credentials,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Arc<dyn MediaSession>, RuntimeError>;

    /// Releases the registered device and logger.
    fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSubscriber;

    impl SubscriberObserver for NoopSubscriber {
        fn on_connected(&self, _subscriber: &dyn SubscriberControl, _stream: &StreamInfo) {}

        fn on_error(
            &self,
            _subscriber: &dyn SubscriberControl,
            _message: &str,
            _code: SubscriberErrorCode,
        ) {
        }
    }

    fn stream() -> StreamInfo {
        StreamInfo {
            id: "stream-1".to_string(),
            connection_id: "conn-1".to_string(),
            has_audio: true,
            has_video: true,
        }
    }

    #[test]
    fn test_subscriber_video_toggle() {
        let mut subscriber = Subscriber::new(stream(), Arc::new(NoopSubscriber));
        assert!(subscriber.subscribe_to_video());

        subscriber.set_subscribe_to_video(false);
        assert!(!subscriber.subscribe_to_video());
        assert_eq!(subscriber.stream().id, "stream-1");
    }

    #[test]
    fn test_unsupported_display() {
        assert_eq!(
            Unsupported.to_string(),
            "capability not supported by this audio device"
        );
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn MediaRuntime>();
        assert_send_sync::<dyn MediaSession>();
        assert_send_sync::<dyn AudioDeviceCallbacks>();
        assert_send_sync::<dyn RenderSource>();
    }
}

//! Session glue: reacts to runtime callbacks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::runtime::{
    ConnectionInfo, MediaSession, SessionErrorCode, SessionObserver, StreamInfo, Subscriber,
    SubscriberControl, SubscriberErrorCode, SubscriberObserver, VideoFrame,
};

/// Counters about what a session has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Remote streams offered by the runtime.
    pub streams_received: u64,
    /// Subscriptions the runtime accepted.
    pub subscriptions: u64,
    /// Session and subscribe errors.
    pub errors: u64,
}

/// Observer for one session.
///
/// Subscribes to every received stream with video disabled and tracks
/// whether the session is connected. The connected flag belongs to this
/// session alone, so several controllers can coexist in one process.
pub struct SessionController {
    connected: AtomicBool,
    streams_received: AtomicU64,
    subscriptions: AtomicU64,
    errors: AtomicU64,
    subscriber: Arc<SubscriberLogger>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    /// Creates a controller for a session that has not connected yet.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            streams_received: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            subscriber: Arc::new(SubscriberLogger),
        }
    }

    /// Returns `true` between `on_connected` and `on_disconnected`.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Returns the current counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            streams_received: self.streams_received.load(Ordering::SeqCst),
            subscriptions: self.subscriptions.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

impl SessionObserver for SessionController {
    fn on_connected(&self, session: &dyn MediaSession) {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(session_id = session.id(), "session connected");
    }

    fn on_connection_created(&self, _session: &dyn MediaSession, connection: &ConnectionInfo) {
        tracing::info!(connection_id = %connection.id, "connection created");
    }

    fn on_connection_dropped(&self, _session: &dyn MediaSession, connection: &ConnectionInfo) {
        tracing::info!(connection_id = %connection.id, "connection dropped");
    }

    fn on_stream_received(&self, session: &dyn MediaSession, stream: &StreamInfo) {
        self.streams_received.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            stream_id = %stream.id,
            has_audio = stream.has_audio,
            has_video = stream.has_video,
            "stream received"
        );

        let observer: Arc<dyn SubscriberObserver> = self.subscriber.clone();
        let mut subscriber = Subscriber::new(stream.clone(), observer);
        subscriber.set_subscribe_to_video(false);

        match session.subscribe(subscriber) {
            Ok(()) => {
                self.subscriptions.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                // The session stays up; only this stream goes unrendered
                self.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(stream_id = %stream.id, error = %e, "could not subscribe");
            }
        }
    }

    fn on_stream_dropped(&self, _session: &dyn MediaSession, stream: &StreamInfo) {
        tracing::info!(stream_id = %stream.id, "stream dropped");
    }

    fn on_disconnected(&self, session: &dyn MediaSession) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!(session_id = session.id(), "session disconnected");
    }

    fn on_error(&self, session: &dyn MediaSession, message: &str, code: SessionErrorCode) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        tracing::error!(session_id = session.id(), ?code, reason = message, "session error");
    }
}

/// Subscriber observer that logs and keeps video off.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubscriberLogger;

impl SubscriberObserver for SubscriberLogger {
    fn on_connected(&self, subscriber: &dyn SubscriberControl, stream: &StreamInfo) {
        subscriber.set_subscribe_to_video(false);
        tracing::info!(stream_id = %stream.id, "subscriber connected");
    }

    fn on_render_frame(&self, _subscriber: &dyn SubscriberControl, _frame: &VideoFrame) {}

    fn on_error(&self, subscriber: &dyn SubscriberControl, message: &str, code: SubscriberErrorCode) {
        tracing::error!(
            stream_id = subscriber.stream_id(),
            ?code,
            reason = message,
            "subscriber error"
        );
    }
}

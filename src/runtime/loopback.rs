//! In-process media runtime that loops a synthetic remote participant back
//! to the application.
//!
//! The loopback runtime drives the same callback surface a networked runtime
//! would, on its own threads:
//!
//! 1. `connect` → `on_connected`, `on_connection_created`, `on_stream_received`
//! 2. `subscribe` → `get_render_settings`, `start_renderer`, subscriber
//!    `on_connected`, then a media thread decoding a sine tone into the render
//!    buffer every 10ms
//! 3. `disconnect` → media thread joined, `destroy_renderer`,
//!    `on_stream_dropped`, `on_connection_dropped`, `on_disconnected`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use super::render_buffer::{render_buffer, RenderProducer, RingRenderSource};
use super::tone::ToneGenerator;
use super::{
    AudioDeviceCallbacks, ConnectionInfo, LogCallback, MediaRuntime, MediaSession, RenderSource,
    SessionErrorCode, SessionObserver, StreamInfo, Subscriber, SubscriberControl,
    SubscriberErrorCode, SubscriberObserver, VideoFrame,
};
use crate::config::{Credentials, RenderSettings};
use crate::RuntimeError;

/// Cadence at which decoded audio is delivered.
const MEDIA_TICK: Duration = Duration::from_millis(10);

/// Render buffer capacity: 2 seconds at 16kHz mono.
const RENDER_BUFFER_CAPACITY: usize = 16000 * 2;

/// Tone amplitude as a fraction of full scale.
const TONE_AMPLITUDE: f64 = 0.5;

/// Video frames are delivered every third tick (~33fps).
const VIDEO_TICK_DIVISOR: u64 = 3;

/// Dimensions of the synthetic video frames.
const VIDEO_WIDTH: u32 = 640;
const VIDEO_HEIGHT: u32 = 480;

/// State shared by the runtime handle and every session it creates.
struct RuntimeShared {
    tone_hz: f64,
    device: Mutex<Option<Arc<dyn AudioDeviceCallbacks>>>,
    logger: Mutex<Option<LogCallback>>,
    producer: Arc<Mutex<RenderProducer>>,
    source: Arc<RingRenderSource>,
    next_session: AtomicU64,
}

impl RuntimeShared {
    fn log(&self, message: &str) {
        // Clone out so the callback never runs under the lock
        let logger = self.logger.lock().clone();
        if let Some(logger) = logger {
            logger(message);
        }
    }
}

/// In-process [`MediaRuntime`] with one synthetic remote participant.
///
/// # Example
///
/// ```
/// use render_drain::runtime::{LoopbackRuntime, MediaRuntime};
///
/// let runtime = LoopbackRuntime::init(440.0)?;
/// runtime.enable_logging(std::sync::Arc::new(|line: &str| println!("{line}")));
/// # Ok::<(), render_drain::RuntimeError>(())
/// ```
#[derive(Clone)]
pub struct LoopbackRuntime {
    shared: Arc<RuntimeShared>,
}

impl LoopbackRuntime {
    /// Initializes the runtime; the remote participant will send a tone at
    /// `tone_hz`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InitFailed`] if the tone is not representable at the
    /// 16kHz render rate.
    pub fn init(tone_hz: f64) -> Result<Self, RuntimeError> {
        let nyquist = f64::from(RenderSettings::MONO_16KHZ.sample_rate_hz) / 2.0;
        if !tone_hz.is_finite() || tone_hz <= 0.0 || tone_hz >= nyquist {
            return Err(RuntimeError::InitFailed {
                reason: format!("tone frequency {tone_hz}Hz must be within (0, {nyquist})Hz"),
            });
        }

        let (producer, source) = render_buffer(RENDER_BUFFER_CAPACITY);

        Ok(Self {
            shared: Arc::new(RuntimeShared {
                tone_hz,
                device: Mutex::new(None),
                logger: Mutex::new(None),
                producer: Arc::new(Mutex::new(producer)),
                source: Arc::new(source),
                next_session: AtomicU64::new(1),
            }),
        })
    }

    /// Samples dropped because the drain fell behind.
    pub fn dropped_samples(&self) -> u64 {
        self.shared.producer.lock().dropped_samples()
    }
}

impl MediaRuntime for LoopbackRuntime {
    fn set_audio_device(&self, device: Arc<dyn AudioDeviceCallbacks>) -> Result<(), RuntimeError> {
        if device.get_render_settings().is_err() {
            return Err(RuntimeError::DeviceRegistration {
                reason: "device does not support rendering".to_string(),
            });
        }

        let mut slot = self.shared.device.lock();
        if slot.is_some() {
            return Err(RuntimeError::DeviceRegistration {
                reason: "an audio device is already registered".to_string(),
            });
        }
        *slot = Some(device);
        drop(slot);

        self.shared.log("custom audio device registered");
        Ok(())
    }

    fn enable_logging(&self, callback: LogCallback) {
        *self.shared.logger.lock() = Some(callback);
        self.shared.log("logging enabled");
    }

    fn render_source(&self) -> Arc<dyn RenderSource> {
        Arc::clone(&self.shared.source) as Arc<dyn RenderSource>
    }

    fn new_session(
        &self,
        credentials: &Credentials,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Arc<dyn MediaSession>, RuntimeError> {
        if credentials.api_key.is_empty() {
            return Err(RuntimeError::SessionCreate {
                reason: "api key is empty".to_string(),
            });
        }
        if credentials.session_id.is_empty() {
            return Err(RuntimeError::SessionCreate {
                reason: "session id is empty".to_string(),
            });
        }

        let n = self.shared.next_session.fetch_add(1, Ordering::SeqCst);
        let session = LoopbackSession {
            shared: Arc::new(SessionShared {
                id: credentials.session_id.clone(),
                runtime: Arc::clone(&self.shared),
                observer,
                state: Mutex::new(SessionState::Idle),
                connection: ConnectionInfo {
                    id: format!("loopback-connection-{n}"),
                },
                remote: StreamInfo {
                    id: format!("loopback-stream-{n}"),
                    connection_id: format!("loopback-connection-{n}"),
                    has_audio: true,
                    has_video: true,
                },
                connect_thread: Mutex::new(None),
                pump: Mutex::new(None),
                subscribing: AtomicBool::new(false),
            }),
        };

        self.shared
            .log(&format!("session {} created", credentials.session_id));
        Ok(Arc::new(session))
    }

    fn shutdown(&self) {
        self.shared.log("runtime shutting down");
        self.shared.device.lock().take();
        self.shared.logger.lock().take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// The media thread of one subscription.
struct MediaPump {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    renderer: Option<Arc<dyn AudioDeviceCallbacks>>,
}

impl MediaPump {
    /// Joins the media thread, then releases the renderer.
    fn stop(self, runtime: &RuntimeShared) {
        self.running.store(false, Ordering::SeqCst);
        if self.handle.join().is_err() {
            runtime.log("media thread panicked");
        }
        if let Some(device) = self.renderer {
            if !device.destroy_renderer() {
                runtime.log("destroy_renderer reported failure");
            }
        }
    }
}

struct SessionShared {
    id: String,
    runtime: Arc<RuntimeShared>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<SessionState>,
    connection: ConnectionInfo,
    remote: StreamInfo,
    connect_thread: Mutex<Option<JoinHandle<()>>>,
    pump: Mutex<Option<MediaPump>>,
    subscribing: AtomicBool,
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.stop(&self.runtime);
        }
    }
}

/// Session handle returned by [`LoopbackRuntime`]. Clones share state.
#[derive(Clone)]
pub struct LoopbackSession {
    shared: Arc<SessionShared>,
}

impl LoopbackSession {
    fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Runs on the connect thread.
    fn complete_connect(&self, token: &str) {
        let shared = &self.shared;

        if token.is_empty() {
            *shared.state.lock() = SessionState::Idle;
            shared.runtime.log("connect rejected: empty token");
            shared
                .observer
                .on_error(self, "token rejected", SessionErrorCode::AuthorizationFailure);
            return;
        }

        {
            let mut state = shared.state.lock();
            if *state != SessionState::Connecting {
                // Disconnected before the handshake finished
                return;
            }
            *state = SessionState::Connected;
        }

        shared.runtime.log(&format!("session {} connected", shared.id));
        shared.observer.on_connected(self);
        shared
            .observer
            .on_connection_created(self, &shared.connection);
        shared.observer.on_stream_received(self, &shared.remote);
    }

    /// Subscribe path after the single in-flight slot was taken. No lock is
    /// held while device or observer callbacks run.
    fn subscribe_reserved(
        &self,
        subscriber: &Subscriber,
        stream: StreamInfo,
    ) -> Result<(), RuntimeError> {
        let shared = &self.shared;

        if shared.pump.lock().is_some() {
            return Err(RuntimeError::Subscribe {
                stream_id: stream.id,
                reason: "already subscribed".to_string(),
            });
        }

        let control = Arc::new(LoopbackSubscriber {
            stream_id: stream.id.clone(),
            video: AtomicBool::new(subscriber.subscribe_to_video() && stream.has_video),
        });
        let observer = Arc::clone(subscriber.observer());

        let device = shared.runtime.device.lock().clone();
        let mut renderer = None;
        let mut settings = RenderSettings::MONO_16KHZ;

        match device {
            None => shared.runtime.log("no audio device registered; audio is not rendered"),
            Some(device) => match device.get_render_settings() {
                Err(_) => shared.runtime.log("audio device cannot render"),
                Ok(reported) => {
                    settings = reported;
                    shared.runtime.log(&format!(
                        "render settings: {} channel(s) at {}Hz",
                        reported.channel_count, reported.sample_rate_hz
                    ));
                    if device.start_renderer() {
                        renderer = Some(device);
                    } else {
                        observer.on_error(
                            control.as_ref(),
                            "audio renderer failed to start",
                            SubscriberErrorCode::RendererFailed,
                        );
                    }
                }
            },
        }

        observer.on_connected(control.as_ref(), &stream);

        // Callbacks may have disconnected the session
        if self.state() != SessionState::Connected {
            if let Some(device) = renderer {
                device.destroy_renderer();
            }
            return Err(RuntimeError::NotConnected {
                session_id: shared.id.clone(),
            });
        }

        let render_audio = renderer.is_some() && stream.has_audio;
        let (running, handle) = match self.spawn_pump(control, observer, settings, render_audio) {
            Ok(spawned) => spawned,
            Err(e) => {
                if let Some(device) = renderer {
                    device.destroy_renderer();
                }
                return Err(RuntimeError::Subscribe {
                    stream_id: stream.id,
                    reason: e.to_string(),
                });
            }
        };
        let pump = MediaPump {
            running,
            handle,
            renderer,
        };

        // Install only if no disconnect ran since the state check
        let rejected = {
            let state = shared.state.lock();
            let mut slot = shared.pump.lock();
            if *state == SessionState::Connected && slot.is_none() {
                *slot = Some(pump);
                None
            } else {
                Some(pump)
            }
        };
        if let Some(pump) = rejected {
            pump.stop(&shared.runtime);
            return Err(RuntimeError::NotConnected {
                session_id: shared.id.clone(),
            });
        }

        shared
            .runtime
            .log(&format!("subscribed to {}", stream.id));
        Ok(())
    }

    fn spawn_pump(
        &self,
        control: Arc<LoopbackSubscriber>,
        observer: Arc<dyn SubscriberObserver>,
        settings: RenderSettings,
        render_audio: bool,
    ) -> std::io::Result<(Arc<AtomicBool>, JoinHandle<()>)> {
        let running = Arc::new(AtomicBool::new(true));
        let pump_running = Arc::clone(&running);
        let producer = Arc::clone(&self.shared.runtime.producer);
        let mut tone = ToneGenerator::new(self.shared.runtime.tone_hz, settings, TONE_AMPLITUDE);
        let samples_per_tick =
            (settings.sample_rate_hz as usize / 100) * usize::from(settings.channel_count);

        let handle = std::thread::Builder::new()
            .name("loopback-media".to_string())
            .spawn(move || {
                let mut tick: u64 = 0;
                while pump_running.load(Ordering::SeqCst) {
                    if render_audio {
                        let frame = tone.next_frame(samples_per_tick);
                        producer.lock().push_samples(&frame);
                    }
                    if control.video_enabled() && tick % VIDEO_TICK_DIVISOR == 0 {
                        let frame = VideoFrame {
                            width: VIDEO_WIDTH,
                            height: VIDEO_HEIGHT,
                            timestamp_ms: tick * MEDIA_TICK.as_millis() as u64,
                        };
                        observer.on_render_frame(control.as_ref(), &frame);
                    }
                    tick += 1;
                    std::thread::sleep(MEDIA_TICK);
                }
            })?;

        Ok((running, handle))
    }
}

impl MediaSession for LoopbackSession {
    fn id(&self) -> &str {
        &self.shared.id
    }

    fn connect(&self, token: &str) -> Result<(), RuntimeError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                SessionState::Connecting | SessionState::Connected => {
                    self.shared.runtime.log("connect ignored: already connecting");
                    return Ok(());
                }
                SessionState::Idle | SessionState::Disconnected => {
                    *state = SessionState::Connecting;
                }
            }
        }

        let session = self.clone();
        let token = token.to_string();
        let handle = std::thread::Builder::new()
            .name("loopback-connect".to_string())
            .spawn(move || session.complete_connect(&token))
            .map_err(|e| {
                *self.shared.state.lock() = SessionState::Idle;
                RuntimeError::ConnectFailed {
                    session_id: self.shared.id.clone(),
                    reason: e.to_string(),
                }
            })?;

        let previous = self.shared.connect_thread.lock().replace(handle);
        if let Some(previous) = previous {
            if previous.join().is_err() {
                self.shared.runtime.log("connect thread panicked");
            }
        }
        Ok(())
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<(), RuntimeError> {
        let shared = &self.shared;
        let stream = subscriber.stream().clone();

        if self.state() != SessionState::Connected {
            return Err(RuntimeError::NotConnected {
                session_id: shared.id.clone(),
            });
        }
        if stream.id != shared.remote.id {
            return Err(RuntimeError::Subscribe {
                stream_id: stream.id,
                reason: "unknown stream".to_string(),
            });
        }

        if shared.subscribing.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::Subscribe {
                stream_id: stream.id,
                reason: "subscription in progress".to_string(),
            });
        }
        let result = self.subscribe_reserved(&subscriber, stream);
        shared.subscribing.store(false, Ordering::SeqCst);
        result
    }

    fn disconnect(&self) -> Result<(), RuntimeError> {
        let shared = &self.shared;
        {
            let mut state = shared.state.lock();
            if *state != SessionState::Connected {
                return Err(RuntimeError::NotConnected {
                    session_id: shared.id.clone(),
                });
            }
            *state = SessionState::Disconnected;
        }

        // A subscribe racing on the connect thread must land before the pump
        // is collected
        let connect_thread = shared.connect_thread.lock().take();
        if let Some(handle) = connect_thread {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                shared.runtime.log("connect thread panicked");
            }
        }

        let pump = shared.pump.lock().take();
        if let Some(pump) = pump {
            pump.stop(&shared.runtime);
            shared.observer.on_stream_dropped(self, &shared.remote);
        }

        shared
            .observer
            .on_connection_dropped(self, &shared.connection);
        shared.runtime.log(&format!("session {} disconnected", shared.id));
        shared.observer.on_disconnected(self);
        Ok(())
    }
}

/// Subscriber control handed to subscriber callbacks.
struct LoopbackSubscriber {
    stream_id: String,
    video: AtomicBool,
}

impl LoopbackSubscriber {
    fn video_enabled(&self) -> bool {
        self.video.load(Ordering::SeqCst)
    }
}

impl SubscriberControl for LoopbackSubscriber {
    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn set_subscribe_to_video(&self, enabled: bool) {
        self.video.store(enabled, Ordering::SeqCst);
    }
}

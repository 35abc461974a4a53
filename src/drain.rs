//! Render drain worker - pulls decoded frames and writes them to a sink.
//!
//! The drain owns exactly one worker thread while running:
//!
//! ```text
//! Runtime decoder → RenderSource → [drain thread: read 160 → write → sleep 10ms] → Sink
//! ```
//!
//! - Reads are fixed-size and the cadence is fixed; the sleep happens whether
//!   or not anything was read
//! - A zero-sample read means nothing is ready and produces no write
//! - A failed write is reported and the frame dropped; the worker keeps going
//! - `stop` flips a shared flag and joins, so nothing touches the sink once
//!   it returns

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::config::{DrainConfig, FRAME_SAMPLES};
use crate::event::EventCallback;
use crate::frame::SampleFrame;
use crate::runtime::RenderSource;
use crate::sink::Sink;
use crate::{DrainError, DrainEvent};

/// Name given to the worker thread.
const WORKER_THREAD_NAME: &str = "render-drain";

/// Counters describing a drain's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Read attempts made.
    pub polls: u64,
    /// Reads that returned no samples.
    pub empty_polls: u64,
    /// Frames written to the sink.
    pub frames_written: u64,
    /// Samples written to the sink.
    pub samples_written: u64,
    /// Frames dropped because the sink failed.
    pub write_errors: u64,
}

/// Counters shared between the drain handle and its worker.
#[derive(Default)]
struct DrainCounters {
    polls: AtomicU64,
    empty_polls: AtomicU64,
    frames_written: AtomicU64,
    samples_written: AtomicU64,
    write_errors: AtomicU64,
}

impl DrainCounters {
    fn snapshot(&self) -> DrainStats {
        DrainStats {
            polls: self.polls.load(Ordering::SeqCst),
            empty_polls: self.empty_polls.load(Ordering::SeqCst),
            frames_written: self.frames_written.load(Ordering::SeqCst),
            samples_written: self.samples_written.load(Ordering::SeqCst),
            write_errors: self.write_errors.load(Ordering::SeqCst),
        }
    }
}

type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// A running worker: the stop flag and the thread to join.
struct DrainWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// State the worker thread carries through the loop.
struct DrainLoop {
    source: Arc<dyn RenderSource>,
    sink: SharedSink,
    sink_name: String,
    frame: SampleFrame,
    frame_samples: usize,
    counters: Arc<DrainCounters>,
    event_callback: Option<EventCallback>,
}

impl DrainLoop {
    /// One read, and one write if the read produced anything.
    ///
    /// Returns the number of samples read.
    fn poll_once(&mut self) -> usize {
        let read = self
            .source
            .read_render_data(&mut self.frame.buffer_mut()[..self.frame_samples]);
        self.frame.set_len(read);
        self.counters.polls.fetch_add(1, Ordering::SeqCst);

        if self.frame.is_empty() {
            self.counters.empty_polls.fetch_add(1, Ordering::SeqCst);
            return 0;
        }

        let result = self.sink.lock().write(self.frame.samples());
        match result {
            Ok(()) => {
                self.counters.frames_written.fetch_add(1, Ordering::SeqCst);
                self.counters
                    .samples_written
                    .fetch_add(self.frame.len() as u64, Ordering::SeqCst);
                tracing::trace!(samples = read, "render frame written");
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    sink = %self.sink_name,
                    samples = self.frame.len(),
                    error = %e,
                    "failed to write render frame, dropping it"
                );
                if let Some(ref callback) = self.event_callback {
                    callback(DrainEvent::SinkError {
                        sink_name: self.sink_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        read
    }

    /// Polls at a fixed cadence until `running` is cleared.
    fn run(mut self, running: &AtomicBool, poll_interval: std::time::Duration) {
        tracing::debug!(sink = %self.sink_name, "drain worker running");

        while running.load(Ordering::SeqCst) {
            self.poll_once();
            std::thread::sleep(poll_interval);
        }

        tracing::debug!(sink = %self.sink_name, "drain worker exiting");
    }
}

/// Pulls render data from a [`RenderSource`] into a [`Sink`] on a dedicated
/// thread.
///
/// At most one worker runs at a time. `start` while running is an error,
/// `stop` while stopped is a no-op. Dropping the drain stops and joins the
/// worker.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use render_drain::runtime::MockRenderSource;
/// use render_drain::{ChannelSink, DrainConfig, RenderDrain};
///
/// let (tx, mut rx) = tokio::sync::mpsc::channel(16);
/// let drain = RenderDrain::new(ChannelSink::new(tx), DrainConfig::default());
///
/// let source = Arc::new(MockRenderSource::with_reads([vec![1; 160]]));
/// drain.start(source)?;
/// let frame = rx.blocking_recv().unwrap();
/// let stats = drain.stop()?;
///
/// assert_eq!(frame.len(), 160);
/// assert_eq!(stats.frames_written, 1);
/// # Ok::<(), render_drain::DrainError>(())
/// ```
pub struct RenderDrain {
    config: DrainConfig,
    sink: SharedSink,
    sink_name: String,
    worker: Mutex<Option<DrainWorker>>,
    counters: Arc<DrainCounters>,
    event_callback: Option<EventCallback>,
    closed: AtomicBool,
}

impl RenderDrain {
    /// Creates a stopped drain writing to `sink`.
    pub fn new(sink: impl Sink + 'static, config: DrainConfig) -> Self {
        let sink: Box<dyn Sink> = Box::new(sink);
        let sink_name = sink.name().to_string();

        Self {
            config,
            sink: Arc::new(Mutex::new(sink)),
            sink_name,
            worker: Mutex::new(None),
            counters: Arc::new(DrainCounters::default()),
            event_callback: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Sets the event callback.
    #[must_use]
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Name of the sink this drain writes to.
    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Returns `true` while a worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Current counters.
    pub fn stats(&self) -> DrainStats {
        self.counters.snapshot()
    }

    /// Launches the worker thread polling `source`.
    ///
    /// # Errors
    ///
    /// - [`DrainError::AlreadyRunning`] if a worker is alive
    /// - [`DrainError::Closed`] after [`close`](Self::close)
    /// - [`DrainError::Sink`] if the sink refuses to start
    /// - [`DrainError::WorkerSpawn`] if the thread cannot be created
    pub fn start(&self, source: Arc<dyn RenderSource>) -> Result<(), DrainError> {
        let mut worker = self.worker.lock();

        if self.closed.load(Ordering::SeqCst) {
            return Err(DrainError::Closed);
        }

        if let Some(existing) = worker.take() {
            if !existing.handle.is_finished() {
                *worker = Some(existing);
                return Err(DrainError::AlreadyRunning);
            }
            // Reap a worker that ended on its own (only possible via panic)
            if existing.handle.join().is_err() {
                tracing::warn!(sink = %self.sink_name, "previous drain worker had panicked");
            }
        }

        self.sink
            .lock()
            .on_start()
            .map_err(|source| DrainError::Sink {
                sink_name: self.sink_name.clone(),
                source,
            })?;

        let running = Arc::new(AtomicBool::new(true));
        let drain_loop = DrainLoop {
            source,
            sink: Arc::clone(&self.sink),
            sink_name: self.sink_name.clone(),
            frame: SampleFrame::new(),
            frame_samples: self.config.frame_samples.clamp(1, FRAME_SAMPLES),
            counters: Arc::clone(&self.counters),
            event_callback: self.event_callback.clone(),
        };
        let poll_interval = self.config.poll_interval;
        let worker_running = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || drain_loop.run(&worker_running, poll_interval))
            .map_err(|source| DrainError::WorkerSpawn { source })?;

        *worker = Some(DrainWorker { running, handle });
        drop(worker);

        tracing::info!(
            sink = %self.sink_name,
            frame_samples = self.config.frame_samples,
            poll_interval = ?self.config.poll_interval,
            "render drain started"
        );
        self.emit_event(DrainEvent::RendererStarted);
        Ok(())
    }

    /// Signals the worker to stop and blocks until its thread has exited,
    /// then flushes the sink.
    ///
    /// Returns immediately with the current counters if no worker exists.
    ///
    /// # Errors
    ///
    /// - [`DrainError::WorkerPanicked`] if the thread panicked
    /// - [`DrainError::Sink`] if the flush fails
    pub fn stop(&self) -> Result<DrainStats, DrainError> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(self.stats());
        };

        worker.running.store(false, Ordering::SeqCst);
        let joined = worker.handle.join();

        let flushed = self.sink.lock().flush();
        let stats = self.stats();

        tracing::info!(
            sink = %self.sink_name,
            frames = stats.frames_written,
            samples = stats.samples_written,
            write_errors = stats.write_errors,
            "render drain stopped"
        );
        self.emit_event(DrainEvent::RendererStopped { stats });

        if joined.is_err() {
            return Err(DrainError::WorkerPanicked);
        }
        flushed.map_err(|source| DrainError::Sink {
            sink_name: self.sink_name.clone(),
            source,
        })?;

        Ok(stats)
    }

    /// Performs a single read/write step on the calling thread.
    ///
    /// Useful to drain deterministically without the worker. Returns the
    /// number of samples read.
    ///
    /// # Errors
    ///
    /// [`DrainError::AlreadyRunning`] if a worker is alive.
    pub fn poll_once(&self, source: Arc<dyn RenderSource>) -> Result<usize, DrainError> {
        // Held for the whole step so `start` cannot add a second reader
        let worker = self.worker.lock();
        if worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
        {
            return Err(DrainError::AlreadyRunning);
        }

        let mut drain_loop = DrainLoop {
            source,
            sink: Arc::clone(&self.sink),
            sink_name: self.sink_name.clone(),
            frame: SampleFrame::new(),
            frame_samples: self.config.frame_samples.clamp(1, FRAME_SAMPLES),
            counters: Arc::clone(&self.counters),
            event_callback: self.event_callback.clone(),
        };
        let read = drain_loop.poll_once();
        drop(worker);
        Ok(read)
    }

    /// Stops the worker if needed and finalizes the sink.
    ///
    /// Later calls only return the counters.
    pub fn close(&self) -> Result<DrainStats, DrainError> {
        let already_closed = self.closed.swap(true, Ordering::SeqCst);
        let stopped = self.stop();

        if already_closed {
            return stopped;
        }

        let finalized = self.sink.lock().on_stop();
        let stats = stopped?;
        finalized.map_err(|source| DrainError::Sink {
            sink_name: self.sink_name.clone(),
            source,
        })?;

        Ok(stats)
    }

    fn emit_event(&self, event: DrainEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

impl Drop for RenderDrain {
    fn drop(&mut self) {
        if self.worker.get_mut().is_some() {
            // Dropped without explicit stop() - join before the sink goes away
            if let Err(e) = self.stop() {
                tracing::warn!(sink = %self.sink_name, error = %e, "drain stop during drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRenderSource;
    use crate::SinkError;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Records every write; optionally fails the first `fail_first` writes.
    #[derive(Clone, Default)]
    struct RecordingSink {
        writes: Arc<Mutex<Vec<Vec<i16>>>>,
        flushes: Arc<AtomicUsize>,
        finalized: Arc<AtomicBool>,
        fail_first: Arc<AtomicUsize>,
    }

    impl RecordingSink {
        fn failing(count: usize) -> Self {
            let sink = Self::default();
            sink.fail_first.store(count, Ordering::SeqCst);
            sink
        }

        fn writes(&self) -> Vec<Vec<i16>> {
            self.writes.lock().clone()
        }
    }

    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(SinkError::write_failed("disk full"));
            }
            self.writes.lock().push(samples.to_vec());
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_stop(&mut self) -> Result<(), SinkError> {
            self.finalized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> DrainConfig {
        DrainConfig {
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn test_poll_sequence_160_0_160() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(sink.clone(), DrainConfig::default());
        let source: Arc<dyn RenderSource> = Arc::new(MockRenderSource::with_reads([
            vec![1; 160],
            vec![],
            vec![2; 160],
        ]));

        assert_eq!(drain.poll_once(Arc::clone(&source)).unwrap(), 160);
        assert_eq!(drain.poll_once(Arc::clone(&source)).unwrap(), 0);
        assert_eq!(drain.poll_once(Arc::clone(&source)).unwrap(), 160);

        let writes = sink.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes.iter().map(Vec::len).sum::<usize>(), 320);

        let stats = drain.stats();
        assert_eq!(stats.polls, 3);
        assert_eq!(stats.empty_polls, 1);
        assert_eq!(stats.frames_written, 2);
        assert_eq!(stats.samples_written, 320);
    }

    #[test]
    fn test_worker_writes_frames_in_read_order() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(sink.clone(), fast_config());
        let frames: Vec<Vec<i16>> = (0..5).map(|i| vec![i; 160]).collect();
        let source = Arc::new(MockRenderSource::with_reads(frames.clone()));

        drain.start(source.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || source.remaining() == 0));
        drain.stop().unwrap();

        assert_eq!(sink.writes(), frames);
    }

    #[test]
    fn test_start_twice_is_error() {
        let drain = RenderDrain::new(RecordingSink::default(), fast_config());
        let source = Arc::new(MockRenderSource::new());

        drain.start(source.clone()).unwrap();
        let second = drain.start(source);
        assert!(matches!(second, Err(DrainError::AlreadyRunning)));
        assert!(drain.is_running());

        drain.stop().unwrap();
        assert!(!drain.is_running());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let drain = RenderDrain::new(RecordingSink::default(), fast_config());
        let stats = drain.stop().unwrap();
        assert_eq!(stats, DrainStats::default());
    }

    #[test]
    fn test_stop_twice_is_safe() {
        let drain = RenderDrain::new(RecordingSink::default(), fast_config());
        drain.start(Arc::new(MockRenderSource::new())).unwrap();
        drain.stop().unwrap();
        drain.stop().unwrap();
    }

    #[test]
    fn test_restart_after_stop() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(sink.clone(), fast_config());

        let first = Arc::new(MockRenderSource::with_reads([vec![1; 160]]));
        drain.start(first.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || first.remaining() == 0));
        drain.stop().unwrap();

        let second = Arc::new(MockRenderSource::with_reads([vec![2; 160]]));
        drain.start(second.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || second.remaining() == 0));
        drain.stop().unwrap();

        assert_eq!(sink.writes(), vec![vec![1; 160], vec![2; 160]]);
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_writes_after_stop() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(sink.clone(), fast_config());
        let source = Arc::new(MockRenderSource::new());

        drain.start(source.clone()).unwrap();
        drain.stop().unwrap();

        let writes_at_stop = sink.writes().len();
        let reads_at_stop = source.reads();
        source.push_read(vec![9; 160]);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(sink.writes().len(), writes_at_stop);
        assert_eq!(source.reads(), reads_at_stop);
    }

    #[test]
    fn test_immediate_stop_joins_worker() {
        let drain = RenderDrain::new(RecordingSink::default(), DrainConfig::default());
        drain.start(Arc::new(MockRenderSource::new())).unwrap();
        drain.stop().unwrap();

        assert!(!drain.is_running());
        assert!(drain.worker.lock().is_none());
    }

    #[test]
    fn test_stop_latency_bounded_by_poll_interval() {
        let drain = RenderDrain::new(RecordingSink::default(), DrainConfig::default());
        drain.start(Arc::new(MockRenderSource::new())).unwrap();
        std::thread::sleep(Duration::from_millis(25));

        let started = Instant::now();
        drain.stop().unwrap();
        // One 10ms cycle plus generous scheduling slack
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_write_failure_is_reported_and_worker_continues() {
        let sink = RecordingSink::failing(1);
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = Arc::clone(&errors);
        let drain = RenderDrain::new(sink.clone(), fast_config()).with_event_callback(
            crate::event_callback(move |event| {
                if let DrainEvent::SinkError { error, .. } = event {
                    assert!(error.contains("disk full"));
                    errors_clone.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let source = Arc::new(MockRenderSource::with_reads([vec![1; 160], vec![2; 160]]));

        drain.start(source.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || source.remaining() == 0));
        let stats = drain.stop().unwrap();

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(stats.write_errors, 1);
        assert_eq!(stats.frames_written, 1);
        assert_eq!(sink.writes(), vec![vec![2; 160]]);
    }

    #[test]
    fn test_lifecycle_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let drain = RenderDrain::new(RecordingSink::default(), fast_config()).with_event_callback(
            crate::event_callback(move |event| events_clone.lock().push(event)),
        );

        drain.start(Arc::new(MockRenderSource::new())).unwrap();
        drain.stop().unwrap();

        let events = events.lock();
        assert!(matches!(events[0], DrainEvent::RendererStarted));
        assert!(matches!(events[1], DrainEvent::RendererStopped { .. }));
    }

    #[test]
    fn test_poll_once_rejected_while_running() {
        let drain = RenderDrain::new(RecordingSink::default(), fast_config());
        let source: Arc<dyn RenderSource> = Arc::new(MockRenderSource::new());

        drain.start(Arc::clone(&source)).unwrap();
        assert!(matches!(
            drain.poll_once(source),
            Err(DrainError::AlreadyRunning)
        ));
        drain.stop().unwrap();
    }

    #[test]
    fn test_manual_polls_and_worker_keep_read_order() {
        for _ in 0..20 {
            let sink = RecordingSink::default();
            let drain = RenderDrain::new(sink.clone(), fast_config());
            let source = Arc::new(MockRenderSource::with_reads((0..100).map(|i| vec![i; 160])));
            let shared: Arc<dyn RenderSource> = source.clone();

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    while drain.poll_once(Arc::clone(&shared)).is_ok() {
                        if source.remaining() == 0 {
                            break;
                        }
                    }
                });
                std::thread::sleep(Duration::from_micros(200));
                drain.start(Arc::clone(&shared)).unwrap();
            });

            assert!(wait_until(Duration::from_secs(2), || source.remaining() == 0));
            drain.stop().unwrap();

            let firsts: Vec<i16> = sink.writes().iter().map(|w| w[0]).collect();
            assert_eq!(firsts, (0..100).collect::<Vec<i16>>());
        }
    }

    #[test]
    fn test_frame_samples_limits_read_size() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(
            sink.clone(),
            DrainConfig {
                frame_samples: 80,
                ..Default::default()
            },
        );
        let source: Arc<dyn RenderSource> =
            Arc::new(MockRenderSource::with_reads([vec![3; 160]]));

        assert_eq!(drain.poll_once(source).unwrap(), 80);
        assert_eq!(sink.writes(), vec![vec![3; 80]]);
    }

    #[test]
    fn test_close_finalizes_sink_once() {
        let sink = RecordingSink::default();
        let drain = RenderDrain::new(sink.clone(), fast_config());
        drain.start(Arc::new(MockRenderSource::new())).unwrap();

        drain.close().unwrap();
        assert!(sink.finalized.load(Ordering::SeqCst));
        assert!(!drain.is_running());

        sink.finalized.store(false, Ordering::SeqCst);
        drain.close().unwrap();
        assert!(!sink.finalized.load(Ordering::SeqCst));
    }

    #[test]
    fn test_start_after_close_is_rejected() {
        let drain = RenderDrain::new(RecordingSink::default(), fast_config());
        drain.close().unwrap();

        let result = drain.start(Arc::new(MockRenderSource::new()));
        assert!(matches!(result, Err(DrainError::Closed)));
        assert!(!drain.is_running());
    }

    #[test]
    fn test_drop_joins_worker() {
        let sink = RecordingSink::default();
        let source = Arc::new(MockRenderSource::new());
        {
            let drain = RenderDrain::new(sink.clone(), fast_config());
            drain.start(source.clone()).unwrap();
        }
        let reads_after_drop = source.reads();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(source.reads(), reads_after_drop);
    }
}

//! Integration tests for render-drain.
//!
//! Drain behavior is exercised against scripted render sources and real
//! files; the application tests run a full session against the loopback
//! runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use render_drain::runtime::{AudioDeviceCallbacks, MockRenderSource, RenderSource};
use render_drain::{
    app, AppConfig, AppError, AudioDevice, Credentials, DrainConfig, OutputFormat, PcmFileSink,
    RenderDrain, RuntimeError, ShutdownSignal, Sink, SinkError,
};
use tempfile::TempDir;

/// A test sink that records every write and flags writes after stop.
#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<Vec<Vec<i16>>>>,
    count: Arc<AtomicUsize>,
}

impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.writes.lock().push(samples.to_vec());
        Ok(())
    }
}

fn fast_config() -> DrainConfig {
    DrainConfig {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

fn wait_until_drained(source: &MockRenderSource) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while source.remaining() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(source.remaining(), 0, "source was not drained in time");
}

fn frame(seed: i16) -> Vec<i16> {
    (0..160).map(|i| seed.wrapping_mul(1000).wrapping_add(i)).collect()
}

#[test]
fn test_frames_are_concatenated_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audio_out.pcm");

    let frames: Vec<Vec<i16>> = (1..=5).map(frame).collect();
    let source = Arc::new(MockRenderSource::with_reads(frames.clone()));
    let drain = RenderDrain::new(PcmFileSink::create(&path).unwrap(), fast_config());

    drain.start(source.clone()).unwrap();
    wait_until_drained(&source);
    drain.close().unwrap();

    let expected: Vec<u8> = frames
        .iter()
        .flatten()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn test_empty_read_between_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audio_out.pcm");

    let source = Arc::new(MockRenderSource::with_reads([
        vec![1; 160],
        Vec::new(),
        vec![2; 160],
    ]));
    let sink = RecordingSink::default();
    let drain = RenderDrain::new(sink.clone(), fast_config());
    drain.start(source.clone()).unwrap();
    wait_until_drained(&source);
    let stats = drain.stop().unwrap();

    assert_eq!(sink.count.load(Ordering::SeqCst), 2);
    assert_eq!(stats.samples_written, 320);
    assert!(stats.empty_polls >= 1);

    // Same sequence through a file: 640 bytes, no header
    let source = Arc::new(MockRenderSource::with_reads([
        vec![1; 160],
        Vec::new(),
        vec![2; 160],
    ]));
    let drain = RenderDrain::new(PcmFileSink::create(&path).unwrap(), fast_config());
    drain.start(source.clone()).unwrap();
    wait_until_drained(&source);
    drain.close().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 640);
}

#[test]
fn test_stop_returns_within_one_poll_cycle() {
    let drain = RenderDrain::new(RecordingSink::default(), DrainConfig::default());
    drain.start(Arc::new(MockRenderSource::new())).unwrap();
    std::thread::sleep(Duration::from_millis(25));

    let started = Instant::now();
    drain.stop().unwrap();
    // 10ms poll interval plus scheduling slack
    assert!(started.elapsed() < Duration::from_millis(200));
    assert!(!drain.is_running());
}

#[test]
fn test_no_writes_after_stop() {
    let source = Arc::new(MockRenderSource::new());
    for seed in 0..50 {
        source.push_read(frame(seed));
    }
    let sink = RecordingSink::default();
    let drain = RenderDrain::new(sink.clone(), fast_config());

    drain.start(source.clone()).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    drain.stop().unwrap();

    let writes_at_stop = sink.count.load(Ordering::SeqCst);
    let remaining_at_stop = source.remaining();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(sink.count.load(Ordering::SeqCst), writes_at_stop);
    assert_eq!(source.remaining(), remaining_at_stop);
}

/// Reads block briefly, marking when the worker is inside a read.
struct SlowSource {
    in_read: AtomicBool,
    reads_after_stop: AtomicUsize,
    stopped: AtomicBool,
}

impl RenderSource for SlowSource {
    fn read_render_data(&self, buf: &mut [i16]) -> usize {
        if self.stopped.load(Ordering::SeqCst) {
            self.reads_after_stop.fetch_add(1, Ordering::SeqCst);
        }
        self.in_read.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        self.in_read.store(false, Ordering::SeqCst);
        buf.fill(0);
        buf.len()
    }
}

#[test]
fn test_immediate_stop_joins_worker() {
    let source = Arc::new(SlowSource {
        in_read: AtomicBool::new(false),
        reads_after_stop: AtomicUsize::new(0),
        stopped: AtomicBool::new(false),
    });
    let drain = RenderDrain::new(RecordingSink::default(), fast_config());

    drain.start(source.clone()).unwrap();
    drain.stop().unwrap();
    source.stopped.store(true, Ordering::SeqCst);

    assert!(!drain.is_running());
    assert!(!source.in_read.load(Ordering::SeqCst));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(source.reads_after_stop.load(Ordering::SeqCst), 0);
}

#[test]
fn test_device_reports_mono_16khz_across_lifecycle() {
    let source: Arc<dyn RenderSource> = Arc::new(MockRenderSource::new());
    let device = AudioDevice::new(
        source,
        RenderDrain::new(RecordingSink::default(), fast_config()),
    );

    let check = |device: &AudioDevice| {
        let settings = device.get_render_settings().unwrap();
        assert_eq!((settings.channel_count, settings.sample_rate_hz), (1, 16000));
    };

    check(&device);
    assert!(device.start_renderer());
    check(&device);
    assert!(device.destroy_renderer());
    check(&device);
}

fn app_config(dir: &TempDir, format: OutputFormat) -> AppConfig {
    AppConfig {
        credentials: Credentials {
            api_key: "key".to_string(),
            session_id: "session".to_string(),
            token: "token".to_string(),
        },
        output_path: dir.path().join("audio_out.pcm"),
        output_format: format,
        ..Default::default()
    }
}

async fn run_for(config: AppConfig, duration: Duration) -> Result<render_drain::AppReport, AppError> {
    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        trigger.request();
    });
    app::run(config, shutdown).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_records_loopback_tone_as_raw_pcm() {
    let dir = TempDir::new().unwrap();
    let config = app_config(&dir, OutputFormat::RawPcm);
    let path = config.output_path.clone();

    let report = run_for(config, Duration::from_millis(300)).await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(bytes.len() % 2, 0);
    assert_ne!(&bytes[..4], b"RIFF");
    assert_eq!(bytes.len() as u64, report.drain.samples_written * 2);
    assert_eq!(report.session.subscriptions, 1);

    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert!(samples.iter().any(|&s| s > 1000));
    assert!(samples.iter().any(|&s| s < -1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_records_wav() {
    let dir = TempDir::new().unwrap();
    let config = app_config(&dir, OutputFormat::Wav);
    let path = config.output_path.clone();

    let report = run_for(config, Duration::from_millis(200)).await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(bytes.len() as u64, 44 + report.drain.samples_written * 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_rejects_empty_credentials() {
    let dir = TempDir::new().unwrap();
    let mut config = app_config(&dir, OutputFormat::RawPcm);
    config.credentials.api_key.clear();

    let result = app::run(config, ShutdownSignal::new()).await;
    assert!(matches!(
        result,
        Err(AppError::Runtime(RuntimeError::SessionCreate { .. }))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_with_rejected_token_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = app_config(&dir, OutputFormat::RawPcm);
    config.credentials.token.clear();
    let path = config.output_path.clone();

    let report = run_for(config, Duration::from_millis(100)).await.unwrap();

    assert_eq!(report.drain.samples_written, 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_rejects_invalid_tone() {
    let dir = TempDir::new().unwrap();
    let mut config = app_config(&dir, OutputFormat::RawPcm);
    config.tone_hz = 12_000.0;

    let result = app::run(config, ShutdownSignal::new()).await;
    assert!(matches!(
        result,
        Err(AppError::Runtime(RuntimeError::InitFailed { .. }))
    ));
}

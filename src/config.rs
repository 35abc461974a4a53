//! Configuration types for the render drain and the sample application.

use std::path::PathBuf;
use std::time::Duration;

/// Samples per frame: 10ms at 16kHz mono.
pub const FRAME_SAMPLES: usize = 160;

/// Default output file for the sample application.
pub const DEFAULT_OUTPUT_PATH: &str = "audio_out.pcm";

/// Default tone frequency synthesized by the loopback runtime.
pub const DEFAULT_TONE_HZ: f64 = 440.0;

/// Audio format the custom device reports to the runtime.
///
/// Reported once when the runtime negotiates the renderer and immutable for
/// the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Number of interleaved channels.
    pub channel_count: u16,
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,
}

impl RenderSettings {
    /// Mono, 16kHz. The only format the drain renders.
    pub const MONO_16KHZ: Self = Self {
        channel_count: 1,
        sample_rate_hz: 16000,
    };

    /// Duration covered by `samples` interleaved samples in this format.
    #[must_use]
    pub fn duration_of(&self, samples: usize) -> Duration {
        if self.sample_rate_hz == 0 || self.channel_count == 0 {
            return Duration::ZERO;
        }
        let frames = samples / self.channel_count as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate_hz))
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::MONO_16KHZ
    }
}

/// Configuration for the drain worker.
///
/// # Example
///
/// ```
/// use render_drain::DrainConfig;
/// use std::time::Duration;
///
/// let config = DrainConfig {
///     poll_interval: Duration::from_millis(5),
///     ..Default::default()
/// };
/// assert_eq!(config.frame_samples, 160);
/// ```
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Maximum samples requested per read.
    ///
    /// Default: 160 (one 10ms frame)
    pub frame_samples: usize,

    /// Fixed sleep between poll attempts, independent of how much was read.
    ///
    /// Default: 10ms
    pub poll_interval: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            frame_samples: FRAME_SAMPLES,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// On-disk format for the sample application's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Headerless 16-bit little-endian PCM.
    #[default]
    RawPcm,
    /// The same samples behind a 44-byte WAV header.
    Wav,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcm" | "raw" => Ok(Self::RawPcm),
            "wav" => Ok(Self::Wav),
            other => Err(ConfigError::Invalid {
                key: "RENDER_DRAIN_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

/// Session credentials handed to the runtime.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Application key.
    pub api_key: String,
    /// Session to join.
    pub session_id: String,
    /// Token authorizing the connection.
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("session_id", &self.session_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Configuration for the sample application, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Session credentials.
    pub credentials: Credentials,
    /// Where received audio is written.
    pub output_path: PathBuf,
    /// Output file format.
    pub output_format: OutputFormat,
    /// Forward runtime-internal log lines to tracing.
    pub runtime_logging: bool,
    /// Tone synthesized by the loopback runtime.
    pub tone_hz: f64,
    /// Drain worker settings.
    pub drain: DrainConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            output_format: OutputFormat::default(),
            runtime_logging: false,
            tone_hz: DEFAULT_TONE_HZ,
            drain: DrainConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.credentials = Credentials {
            api_key: lookup("SESSION_API_KEY").unwrap_or_default(),
            session_id: lookup("SESSION_ID").unwrap_or_default(),
            token: lookup("SESSION_TOKEN").unwrap_or_default(),
        };

        if let Some(path) = lookup("RENDER_DRAIN_OUTPUT").filter(|p| !p.is_empty()) {
            config.output_path = PathBuf::from(path);
        }

        if let Some(format) = lookup("RENDER_DRAIN_FORMAT") {
            config.output_format = format.parse()?;
        }

        if let Some(flag) = lookup("RENDER_DRAIN_RUNTIME_LOG") {
            config.runtime_logging = parse_flag("RENDER_DRAIN_RUNTIME_LOG", &flag)?;
        }

        if let Some(tone) = lookup("RENDER_DRAIN_TONE_HZ") {
            config.tone_hz = tone
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|hz| hz.is_finite() && *hz > 0.0)
                .ok_or(ConfigError::Invalid {
                    key: "RENDER_DRAIN_TONE_HZ",
                    value: tone,
                })?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_render_settings_default_is_mono_16khz() {
        let settings = RenderSettings::default();
        assert_eq!(settings.channel_count, 1);
        assert_eq!(settings.sample_rate_hz, 16000);
    }

    #[test]
    fn test_frame_is_ten_milliseconds() {
        let settings = RenderSettings::default();
        assert_eq!(settings.duration_of(FRAME_SAMPLES), Duration::from_millis(10));
    }

    #[test]
    fn test_duration_of_zero_rate() {
        let settings = RenderSettings {
            channel_count: 1,
            sample_rate_hz: 0,
        };
        assert_eq!(settings.duration_of(160), Duration::ZERO);
    }

    #[test]
    fn test_drain_config_defaults() {
        let config = DrainConfig::default();
        assert_eq!(config.frame_samples, 160);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_app_config_defaults_from_empty_env() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.output_path, PathBuf::from("audio_out.pcm"));
        assert_eq!(config.output_format, OutputFormat::RawPcm);
        assert!(!config.runtime_logging);
        assert!(config.credentials.api_key.is_empty());
    }

    #[test]
    fn test_app_config_reads_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SESSION_API_KEY", "key"),
            ("SESSION_ID", "session"),
            ("SESSION_TOKEN", "token"),
            ("RENDER_DRAIN_OUTPUT", "/tmp/out.wav"),
            ("RENDER_DRAIN_FORMAT", "WAV"),
            ("RENDER_DRAIN_RUNTIME_LOG", "1"),
            ("RENDER_DRAIN_TONE_HZ", "1000"),
        ]))
        .unwrap();

        assert_eq!(config.credentials.api_key, "key");
        assert_eq!(config.credentials.session_id, "session");
        assert_eq!(config.credentials.token, "token");
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.wav"));
        assert_eq!(config.output_format, OutputFormat::Wav);
        assert!(config.runtime_logging);
        assert!((config.tone_hz - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_app_config_rejects_bad_format() {
        let err = AppConfig::from_lookup(lookup_from(&[("RENDER_DRAIN_FORMAT", "mp3")]))
            .unwrap_err();
        assert!(err.to_string().contains("RENDER_DRAIN_FORMAT"));
    }

    #[test]
    fn test_app_config_rejects_negative_tone() {
        let result = AppConfig::from_lookup(lookup_from(&[("RENDER_DRAIN_TONE_HZ", "-5")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = Credentials {
            api_key: "k".into(),
            session_id: "s".into(),
            token: "secret".into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
    }
}

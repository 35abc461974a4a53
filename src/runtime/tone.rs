//! Sine tone generator used by the loopback runtime.

use crate::config::RenderSettings;

/// Produces a continuous sine tone, frame by frame.
///
/// Phase carries across calls, so consecutive frames join without clicks.
///
/// # Example
///
/// ```
/// use render_drain::runtime::ToneGenerator;
/// use render_drain::RenderSettings;
///
/// let mut tone = ToneGenerator::new(440.0, RenderSettings::default(), 0.5);
/// let frame = tone.next_frame(160);
/// assert_eq!(frame.len(), 160);
/// assert!(frame.iter().any(|&s| s != 0));
/// ```
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    frequency: f64,
    settings: RenderSettings,
    amplitude: f64,
    position: u64,
}

impl ToneGenerator {
    /// Creates a generator. `amplitude` is a fraction of full scale, clamped
    /// to `0.0..=1.0`.
    pub fn new(frequency: f64, settings: RenderSettings, amplitude: f64) -> Self {
        Self {
            frequency,
            settings,
            amplitude: amplitude.clamp(0.0, 1.0),
            position: 0,
        }
    }

    /// Returns the next `samples` interleaved samples.
    pub fn next_frame(&mut self, samples: usize) -> Vec<i16> {
        let channels = usize::from(self.settings.channel_count.max(1));
        let sample_rate = f64::from(self.settings.sample_rate_hz.max(1));
        let mut out = Vec::with_capacity(samples);

        while out.len() < samples {
            let t = self.position as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * self.frequency * t).sin();
            let sample = (value * self.amplitude * f64::from(i16::MAX)) as i16;

            // Same sample on every channel
            for _ in 0..channels {
                if out.len() == samples {
                    break;
                }
                out.push(sample);
            }
            self.position += 1;
        }

        out
    }
}

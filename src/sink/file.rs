//! File sinks: raw PCM and WAV.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::RenderSettings;
use crate::frame::encode_le;
use crate::sink::Sink;
use crate::SinkError;

// WAV file format constants
// See: http://soundfile.sapp.org/doc/WaveFormat/

/// Byte offset of the file size field in WAV header (RIFF chunk size).
const WAV_FILE_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field in WAV header.
const WAV_DATA_SIZE_OFFSET: u64 = 40;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
const WAV_HEADER_SIZE: u32 = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Bytes per sample (16-bit = 2 bytes).
const BYTES_PER_SAMPLE: u64 = 2;

/// Writes headerless 16-bit little-endian PCM, append-only.
///
/// The file is created (truncating any previous content) when the sink is
/// constructed, so a bad path fails at startup rather than on the first
/// frame. Samples are appended exactly as they arrive; the file carries no
/// format information.
///
/// # Example
///
/// ```no_run
/// use render_drain::PcmFileSink;
///
/// let sink = PcmFileSink::create("audio_out.pcm")?;
/// # Ok::<(), render_drain::SinkError>(())
/// ```
pub struct PcmFileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    samples_written: u64,
}

impl PcmFileSink {
    /// Creates (or truncates) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| SinkError::file_error(&path, e))?;

        Ok(Self {
            name: format!("pcm:{}", path.display()),
            writer: Some(BufWriter::new(file)),
            path,
            samples_written: 0,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl Sink for PcmFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer
            .write_all(&encode_le(samples))
            .map_err(|e| SinkError::file_error(&self.path, e))?;
        self.samples_written += samples.len() as u64;

        tracing::trace!(sink = %self.name, samples = samples.len(), "wrote frame");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(ref mut writer) = self.writer {
            writer
                .flush()
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        self.flush()?;
        self.writer = None;
        tracing::debug!(
            path = %self.path.display(),
            samples = self.samples_written,
            "closed pcm output"
        );
        Ok(())
    }
}

/// Writes the drained samples into a WAV container.
///
/// A placeholder header is written at creation and patched with the real
/// sizes in [`Sink::on_stop`].
pub struct WavFileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    samples_written: u64,
}

impl WavFileSink {
    /// Creates the output file and writes a header for `settings`.
    pub fn create(path: impl AsRef<Path>, settings: RenderSettings) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| SinkError::file_error(&path, e))?;
        let mut writer = BufWriter::new(file);

        write_wav_header(&mut writer, settings, 0).map_err(|e| SinkError::file_error(&path, e))?;

        Ok(Self {
            name: format!("wav:{}", path.display()),
            writer: Some(writer),
            path,
            samples_written: 0,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for WavFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer
            .write_all(&encode_le(samples))
            .map_err(|e| SinkError::file_error(&self.path, e))?;
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(ref mut writer) = self.writer {
            writer
                .flush()
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let data_size = u32::try_from(self.samples_written * BYTES_PER_SAMPLE)
            .map_err(|_| SinkError::write_failed("WAV data exceeds 4 GiB"))?;

        update_wav_header(&mut writer, data_size)
            .and_then(|()| writer.flush())
            .map_err(|e| SinkError::file_error(&self.path, e))
    }
}

/// Writes a complete WAV header (44 bytes).
fn write_wav_header<W: Write>(
    writer: &mut W,
    settings: RenderSettings,
    data_size: u32,
) -> std::io::Result<()> {
    let channels = settings.channel_count;
    let sample_rate = settings.sample_rate_hz;

    writer.write_all(b"RIFF")?;
    writer.write_all(&(WAV_HEADER_SIZE - 8 + data_size).to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
    writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;

    let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
    writer.write_all(&byte_rate.to_le_bytes())?;

    let block_align = channels * bytes_per_sample;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;

    Ok(())
}

/// Patches the RIFF and data sizes once recording is finished.
fn update_wav_header<W: Write + Seek>(writer: &mut W, data_size: u32) -> std::io::Result<()> {
    writer.seek(SeekFrom::Start(WAV_FILE_SIZE_OFFSET))?;
    writer.write_all(&(WAV_HEADER_SIZE - 8 + data_size).to_le_bytes())?;

    writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
    writer.write_all(&data_size.to_le_bytes())?;

    writer.seek(SeekFrom::End(0))?;
    Ok(())
}

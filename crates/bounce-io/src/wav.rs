//! Block-wise WAV output and whole-file helpers.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use bounce_graph::AudioBuffer;

use crate::{Error, Result};

/// Destination for rendered audio, appended to block by block.
///
/// A render that completes calls `close`; a cancelled render calls
/// `discard`, which must leave no partial file behind.
pub trait AudioWriter: Send {
    /// True while the destination can accept samples.
    fn is_open(&self) -> bool;

    /// Append `frames` frames starting at `offset` within `audio`.
    fn append(&mut self, audio: &AudioBuffer, offset: usize, frames: usize) -> Result<()>;

    /// Finalize the destination.
    fn close(&mut self) -> Result<()>;

    /// Abandon the destination, removing any partial output.
    fn discard(&mut self) -> Result<()>;
}

/// Streams rendered blocks into a WAV file.
///
/// Channels the writer has but a block lacks are padded with silence, so
/// a mono tree can feed a stereo file.
pub struct WavBlockWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    channels: usize,
    bits_per_sample: u16,
}

impl WavBlockWriter {
    /// Create the target file. Supported bit depths are 16 and 24
    /// (integer) and 32 (float).
    pub fn create(
        path: impl AsRef<Path>,
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    ) -> Result<Self> {
        let sample_format = match bits_per_sample {
            16 | 24 => hound::SampleFormat::Int,
            32 => hound::SampleFormat::Float,
            other => return Err(Error::UnsupportedBitDepth(other)),
        };
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        };
        let path = path.as_ref().to_path_buf();
        let writer = hound::WavWriter::create(&path, spec)?;
        tracing::debug!(path = %path.display(), channels, sample_rate, bits_per_sample, "created WAV target");
        Ok(Self {
            writer: Some(writer),
            path,
            channels: usize::from(channels),
            bits_per_sample,
        })
    }

    /// The path the file is being written to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioWriter for WavBlockWriter {
    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn append(&mut self, audio: &AudioBuffer, offset: usize, frames: usize) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::Closed)?;
        for i in offset..offset + frames {
            for c in 0..self.channels {
                let sample = if c < audio.num_channels() {
                    audio.channel(c)[i]
                } else {
                    0.0
                };
                match self.bits_per_sample {
                    16 => {
                        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
                    }
                    24 => {
                        writer.write_sample((sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32)?;
                    }
                    _ => writer.write_sample(sample)?,
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        if self.writer.take().is_some() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
            tracing::debug!(path = %self.path.display(), "discarded partial WAV file");
        }
        Ok(())
    }
}

impl Drop for WavBlockWriter {
    fn drop(&mut self) {
        // An unfinished writer still gets a valid header on drop via
        // hound, but make the common path explicit.
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize();
        }
    }
}

/// Read a whole WAV file into non-interleaved `f32` channels.
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    let mut output = vec![Vec::new(); channels];

    match spec.sample_format {
        hound::SampleFormat::Float => {
            for (index, sample) in reader.samples::<f32>().enumerate() {
                output[index % channels].push(sample?);
            }
        }
        hound::SampleFormat::Int => {
            let scale = ((1u32 << (spec.bits_per_sample - 1)) - 1) as f32;
            for (index, sample) in reader.samples::<i32>().enumerate() {
                output[index % channels].push(sample? as f32 / scale);
            }
        }
    }
    Ok((output, spec.sample_rate))
}

/// Write non-interleaved channels out as a complete WAV file.
pub fn write_wav(
    path: impl AsRef<Path>,
    channels: &[Vec<f32>],
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<()> {
    let frames = channels.first().map_or(0, Vec::len);
    let mut buffer = AudioBuffer::with_capacity(channels.len(), frames);
    buffer.begin_block(frames);
    for (c, data) in channels.iter().enumerate() {
        buffer.channel_mut(c).copy_from_slice(data);
    }
    let mut writer = WavBlockWriter::create(path, channels.len() as u16, sample_rate, bits_per_sample)?;
    writer.append(&buffer, 0, frames)?;
    writer.close()
}

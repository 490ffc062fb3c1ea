use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::WavReader;

/// A finite or streaming supply of interleaved stereo samples
pub trait AudioSource: Send {
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>>;
    fn sample_rate(&self) -> u32;
}

/// Stereo WAV file replayed in fixed-size interleaved chunks
pub struct WavFileSource {
    samples: Vec<f32>,
    position: usize,
    chunk_size: usize,
    sample_rate: u32,
}

impl WavFileSource {
    /// `frame_len` is in samples per channel; chunks hold `2 * frame_len`
    pub fn new<P: AsRef<Path>>(path: P, frame_len: usize) -> anyhow::Result<Self> {
        if frame_len == 0 {
            anyhow::bail!("frame_len must be positive");
        }

        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        if spec.channels != 2 {
            anyhow::bail!("Expected stereo WAV file, got {} channels", spec.channels);
        }

        let sample_rate = spec.sample_rate;
        let samples = Self::read_samples(reader, &spec)?;
        log::debug!(
            "Loaded {} stereo samples at {} Hz from {}",
            samples.len() / 2,
            sample_rate,
            path.as_ref().display()
        );

        Ok(Self {
            samples,
            position: 0,
            chunk_size: frame_len * 2,
            sample_rate,
        })
    }

    fn read_samples(
        mut reader: WavReader<BufReader<File>>,
        spec: &hound::WavSpec,
    ) -> anyhow::Result<Vec<f32>> {
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_val = 2_i32.pow(spec.bits_per_sample as u32 - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(samples)
    }

    /// Number of whole frames in the file
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.chunk_size
    }
}

impl AudioSource for WavFileSource {
    /// Next whole frame; a trailing partial frame is dropped
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>> {
        let end = self.position + self.chunk_size;
        if end > self.samples.len() {
            return Ok(None);
        }

        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(Some(chunk))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

use std::path::Path;

use clap::ValueEnum;
use hound::{SampleFormat, WavSpec, WavWriter};

/// Sample encoding for written recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WavEncoding {
    /// 32-bit IEEE float, written unchanged
    #[default]
    Float32,
    /// Signed 16-bit PCM, clipped to [-1, 1] first
    Pcm16,
}

impl WavEncoding {
    fn spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            WavEncoding::Float32 => (32, SampleFormat::Float),
            WavEncoding::Pcm16 => (16, SampleFormat::Int),
        };
        WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Write an interleaved microphone pair `[mic1, mic2, ...]` as a stereo WAV
///
/// An odd number of samples cannot form whole pairs and is rejected.
pub fn save_wav<P: AsRef<Path>>(
    path: P,
    interleaved: &[f32],
    sample_rate: u32,
    encoding: WavEncoding,
) -> anyhow::Result<()> {
    if interleaved.len() % 2 != 0 {
        anyhow::bail!(
            "Interleaved stereo needs an even sample count, got {}",
            interleaved.len()
        );
    }

    let mut writer = WavWriter::create(path, encoding.spec(sample_rate))?;
    match encoding {
        WavEncoding::Float32 => {
            for &sample in interleaved {
                writer.write_sample(sample)?;
            }
        }
        WavEncoding::Pcm16 => {
            for &sample in interleaved {
                let code = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(code)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_sample_count_rejected() {
        let path = std::env::temp_dir().join(format!("earshot_odd_{}.wav", std::process::id()));
        assert!(save_wav(&path, &[0.0, 0.1, 0.2], 8000, WavEncoding::Float32).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_pcm16_clips_and_scales() {
        let path = std::env::temp_dir().join(format!("earshot_pcm16_{}.wav", std::process::id()));
        save_wav(&path, &[0.5, -2.0, 1.0, 0.0], 8000, WavEncoding::Pcm16).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let codes: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        std::fs::remove_file(&path).ok();

        assert_eq!(codes, vec![16384, -32767, 32767, 0]);
    }
}

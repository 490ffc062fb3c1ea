use std::f32::consts::PI;

use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::GeometryConfig;
use crate::dsp::AngleEstimator;

/// Half-width, in samples, of the windowed-sinc fractional delay kernel
pub const SINC_HALF_WIDTH: usize = 16;

/// Peak amplitude of the synthetic broadband source
pub const SOURCE_AMPLITUDE: f32 = 0.5;

pub(super) fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Uniform white noise in `[-amplitude, amplitude]`
pub fn white_noise(len: usize, amplitude: f32, rng: &mut ChaCha8Rng) -> Vec<f32> {
    (0..len)
        .map(|_| (rng.random::<f32>() * 2.0 - 1.0) * amplitude)
        .collect()
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// `y[n] = x(n - delay)`, zero outside the input
///
/// Whole-sample delays are exact shifts; fractional delays use a
/// Hann-windowed sinc of ±[`SINC_HALF_WIDTH`] taps.
pub fn delay_signal(signal: &[f32], delay: f32) -> Vec<f32> {
    let n = signal.len() as isize;

    if delay.fract() == 0.0 {
        let d = delay as isize;
        return (0..n)
            .map(|i| {
                let j = i - d;
                if (0..n).contains(&j) { signal[j as usize] } else { 0.0 }
            })
            .collect();
    }

    let w = SINC_HALF_WIDTH as isize;
    (0..n)
        .map(|i| {
            let t = i as f32 - delay;
            let base = t.floor() as isize;
            let mut acc = 0.0;
            for k in (base - w + 1)..=(base + w) {
                if !(0..n).contains(&k) {
                    continue;
                }
                let x = t - k as f32;
                let window = 0.5 * (1.0 + (PI * x / SINC_HALF_WIDTH as f32).cos());
                acc += signal[k as usize] * sinc(x) * window;
            }
            acc
        })
        .collect()
}

/// Two microphone channels of one broadband source
///
/// Channel 1 hears the source `lag_samples` after channel 2 (negative:
/// before). Both channels are cut from the steady-state middle of a longer
/// stream so neither starts with silence.
pub fn generate_source_pair(len: usize, lag_samples: f32, seed: Option<u64>) -> (Vec<f32>, Vec<f32>) {
    let mut rng = create_rng(seed);
    let pad = lag_samples.abs().ceil() as usize + SINC_HALF_WIDTH + 1;
    let source = white_noise(len + 2 * pad, SOURCE_AMPLITUDE, &mut rng);

    let delayed = delay_signal(&source, lag_samples);
    let ch1 = delayed[pad..pad + len].to_vec();
    let ch2 = source[pad..pad + len].to_vec();
    (ch1, ch2)
}

/// `[a0, b0, a1, b1, ...]`
pub fn interleave(ch1: &[f32], ch2: &[f32]) -> Vec<f32> {
    ch1.iter().zip(ch2).flat_map(|(&a, &b)| [a, b]).collect()
}

pub fn deinterleave(interleaved: &[f32]) -> (Vec<f32>, Vec<f32>) {
    interleaved.chunks_exact(2).map(|c| (c[0], c[1])).unzip()
}

/// Stereo capture of a source at a fixed bearing
///
/// Returns interleaved samples `[mic1, mic2, ...]`.
pub fn generate_test_signal(
    duration_secs: f32,
    sample_rate: u32,
    bearing_degrees: f32,
    geometry: &GeometryConfig,
    seed: Option<u64>,
) -> Vec<f32> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let lag = AngleEstimator::from_config(geometry, sample_rate).lag_for_angle(bearing_degrees);
    let (ch1, ch2) = generate_source_pair(num_samples, lag, seed);
    interleave(&ch1, &ch2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_delay_is_exact_shift() {
        let x: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let y = delay_signal(&x, 3.0);
        assert_eq!(&y[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&y[3..], &x[..7]);

        let y = delay_signal(&x, -2.0);
        assert_eq!(&y[..8], &x[2..]);
    }

    #[test]
    fn test_fractional_delay_of_slow_sine() {
        let freq = 0.02;
        let x: Vec<f32> = (0..400).map(|i| (2.0 * PI * freq * i as f32).sin()).collect();
        let y = delay_signal(&x, 2.5);
        for i in 100..300 {
            let expected = (2.0 * PI * freq * (i as f32 - 2.5)).sin();
            assert!((y[i] - expected).abs() < 0.02, "sample {}: {} vs {}", i, y[i], expected);
        }
    }

    #[test]
    fn test_source_pair_is_seeded() {
        let a = generate_source_pair(64, 4.0, Some(9));
        let b = generate_source_pair(64, 4.0, Some(9));
        assert_eq!(a, b);
        // ch1[n] = ch2[n - 4]
        assert_eq!(&a.0[4..], &a.1[..60]);
    }

    #[test]
    fn test_interleave_roundtrip() {
        let stereo = interleave(&[1.0, 2.0], &[3.0, 4.0]);
        assert_eq!(stereo, vec![1.0, 3.0, 2.0, 4.0]);
        assert_eq!(deinterleave(&stereo), (vec![1.0, 2.0], vec![3.0, 4.0]));
    }
}

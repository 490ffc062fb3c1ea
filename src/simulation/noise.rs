use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use super::signal::{create_rng, delay_signal};
use crate::config::GeometryConfig;
use crate::dsp::AngleEstimator;

/// Impairments applied to a clean microphone pair
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct NoiseConfig {
    pub seed: Option<u64>,
    pub additive: Option<AdditiveNoiseConfig>,
    pub reflection: Option<ReflectionConfig>,
    /// Flip the sign of microphone 2 (a miswired capsule)
    #[serde(default)]
    pub invert_channel2: bool,
}

impl NoiseConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_awgn(mut self, snr_db: f32) -> Self {
        self.additive = Some(AdditiveNoiseConfig { snr_db });
        self
    }

    pub fn with_reflection(
        mut self,
        bearing_degrees: f32,
        amplitude_ratio: f32,
        extra_delay_samples: f32,
    ) -> Self {
        self.reflection = Some(ReflectionConfig {
            bearing_degrees,
            amplitude_ratio,
            extra_delay_samples,
        });
        self
    }

    pub fn with_inverted_channel2(mut self) -> Self {
        self.invert_channel2 = true;
        self
    }
}

/// Independent white Gaussian noise on each microphone
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct AdditiveNoiseConfig {
    pub snr_db: f32,
}

/// A second arrival of the same source from another bearing
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ReflectionConfig {
    pub bearing_degrees: f32,
    pub amplitude_ratio: f32,
    /// Path length difference to the direct arrival, in samples
    #[serde(default)]
    pub extra_delay_samples: f32,
}

pub fn signal_power(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|&x| x * x).sum::<f32>() / signal.len() as f32
}

fn apply_additive_noise(signal: &mut [f32], config: &AdditiveNoiseConfig, rng: &mut ChaCha8Rng) {
    let sig_power = signal_power(signal);
    if sig_power == 0.0 {
        return;
    }

    let snr_linear = 10.0_f32.powf(config.snr_db / 10.0);
    let noise_power = sig_power / snr_linear;
    let noise_std = noise_power.sqrt();

    let Ok(normal) = Normal::new(0.0, noise_std as f64) else {
        return;
    };

    for sample in signal.iter_mut() {
        *sample += normal.sample(rng) as f32;
    }
}

/// Channel 2 carries the undelayed source, so the reflected arrival on each
/// microphone is built from it.
fn apply_reflection(
    ch1: &mut [f32],
    ch2: &mut [f32],
    config: &ReflectionConfig,
    angle: &AngleEstimator,
) {
    let lag = angle.lag_for_angle(config.bearing_degrees);
    let echo2 = delay_signal(ch2, config.extra_delay_samples);
    let echo1 = delay_signal(ch2, config.extra_delay_samples + lag);

    for (s, e) in ch1.iter_mut().zip(&echo1) {
        *s += config.amplitude_ratio * e;
    }
    for (s, e) in ch2.iter_mut().zip(&echo2) {
        *s += config.amplitude_ratio * e;
    }
}

/// Apply every configured impairment to an interleaved stereo signal
pub fn apply_noise(
    clean_signal: &[f32],
    config: &NoiseConfig,
    sample_rate: u32,
    geometry: &GeometryConfig,
) -> Vec<f32> {
    let (mut ch1, mut ch2) = super::signal::deinterleave(clean_signal);
    let mut rng = create_rng(config.seed);
    let angle = AngleEstimator::from_config(geometry, sample_rate);

    if let Some(ref reflection) = config.reflection {
        apply_reflection(&mut ch1, &mut ch2, reflection, &angle);
    }

    if config.invert_channel2 {
        ch2.iter_mut().for_each(|s| *s = -*s);
    }

    if let Some(ref additive) = config.additive {
        apply_additive_noise(&mut ch1, additive, &mut rng);
        apply_additive_noise(&mut ch2, additive, &mut rng);
    }

    super::signal::interleave(&ch1, &ch2)
}

pub fn generate_noisy_test_signal(
    duration_secs: f32,
    sample_rate: u32,
    bearing_degrees: f32,
    geometry: &GeometryConfig,
    noise_config: &NoiseConfig,
) -> Vec<f32> {
    let clean = super::signal::generate_test_signal(
        duration_secs,
        sample_rate,
        bearing_degrees,
        geometry,
        noise_config.seed,
    );
    apply_noise(&clean, noise_config, sample_rate, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awgn_power() {
        let clean: Vec<f32> = super::super::signal::interleave(&[0.5; 20000], &[0.5; 20000]);
        let config = NoiseConfig::default().with_seed(1).with_awgn(0.0);
        let noisy = apply_noise(&clean, &config, 48000, &GeometryConfig::default());

        let noise: Vec<f32> = noisy.iter().zip(&clean).map(|(n, c)| n - c).collect();
        let power = signal_power(&noise);
        assert!((power - 0.25).abs() < 0.02, "noise power {}", power);
    }

    #[test]
    fn test_inversion() {
        let clean = vec![0.1, 0.2, 0.3, 0.4];
        let config = NoiseConfig::default().with_inverted_channel2();
        let out = apply_noise(&clean, &config, 48000, &GeometryConfig::default());
        assert_eq!(out, vec![0.1, -0.2, 0.3, -0.4]);
    }

    #[test]
    fn test_seeded_noise_is_repeatable() {
        let config = NoiseConfig::default().with_seed(3).with_awgn(10.0);
        let a = generate_noisy_test_signal(0.01, 48000, 20.0, &GeometryConfig::default(), &config);
        let b = generate_noisy_test_signal(0.01, 48000, 20.0, &GeometryConfig::default(), &config);
        assert_eq!(a, b);
    }
}

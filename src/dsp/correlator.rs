//! Generalized cross-correlation with phase transform (GCC-PHAT).
//!
//! Both channels are zero-padded to the transform length, transformed, and
//! combined into a cross-power spectrum. Dividing every bin by its own
//! magnitude keeps only phase, so the inverse transform is a sharp pulse at
//! the relative delay regardless of the source spectrum.
//!
//! The output is rotated by half the transform length: index `L/2` is zero
//! lag, index `L/2 + k` is lag `k`. A positive lag means channel 1 lags
//! channel 2.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::{DoaError, Result};

pub struct SpectralCorrelator {
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    spec1: Vec<Complex32>,
    spec2: Vec<Complex32>,
    cross: Vec<Complex32>,
    correlation: Vec<f32>,
    epsilon: f32,
}

impl fmt::Debug for SpectralCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralCorrelator")
            .field("fft_len", &self.fft_len)
            .field("epsilon", &self.epsilon)
            .finish()
    }
}

impl SpectralCorrelator {
    /// Plan transforms of length `fft_len` (a power of two)
    ///
    /// `epsilon` guards the whitening division at spectral nulls.
    pub fn new(fft_len: usize, epsilon: f32) -> Result<Self> {
        if fft_len < 2 || !fft_len.is_power_of_two() {
            return Err(DoaError::InvalidArgument(format!(
                "fft_len must be a power of two >= 2, got {}",
                fft_len
            )));
        }
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(DoaError::InvalidArgument(format!(
                "epsilon must be positive, got {}",
                epsilon
            )));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let zero = Complex32::new(0.0, 0.0);

        Ok(Self {
            fft_len,
            forward,
            inverse,
            scratch: vec![zero; scratch_len],
            spec1: vec![zero; fft_len],
            spec2: vec![zero; fft_len],
            cross: vec![zero; fft_len],
            correlation: vec![0.0; fft_len],
            epsilon,
        })
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Index of zero lag in the centered correlation
    pub fn center(&self) -> usize {
        self.fft_len / 2
    }

    /// Compute the centered PHAT correlation of two preprocessed channels
    ///
    /// Channels must have equal, non-zero length of at most `fft_len / 2`
    /// so the circular correlation does not alias.
    pub fn correlate(&mut self, x1: &[f32], x2: &[f32]) -> Result<&[f32]> {
        if x1.is_empty() {
            return Err(DoaError::InvalidArgument("empty channel".into()));
        }
        if x1.len() != x2.len() {
            return Err(DoaError::LengthMismatch {
                expected: x1.len(),
                actual: x2.len(),
            });
        }
        if x1.len() * 2 > self.fft_len {
            return Err(DoaError::InvalidArgument(format!(
                "{} samples need fft_len >= {}, have {}",
                x1.len(),
                x1.len() * 2,
                self.fft_len
            )));
        }

        zero_pad(x1, &mut self.spec1);
        zero_pad(x2, &mut self.spec2);
        self.forward
            .process_with_scratch(&mut self.spec1, &mut self.scratch);
        self.forward
            .process_with_scratch(&mut self.spec2, &mut self.scratch);

        cross_power_spectrum(&self.spec1, &self.spec2, &mut self.cross);
        phat_whiten(&mut self.cross, self.epsilon);

        // Reuse spec1 as the inverse transform buffer; `cross` stays intact
        self.spec1.copy_from_slice(&self.cross);
        self.inverse
            .process_with_scratch(&mut self.spec1, &mut self.scratch);

        // rustfft's inverse is unnormalized
        let scale = 1.0 / self.fft_len as f32;
        for (r, c) in self.correlation.iter_mut().zip(&self.spec1) {
            *r = c.re * scale;
        }
        center_zero_lag(&mut self.correlation);

        Ok(&self.correlation)
    }

    /// Whitened cross-power spectrum from the last `correlate` call
    pub fn whitened_spectrum(&self) -> &[Complex32] {
        &self.cross
    }

    /// Centered correlation from the last `correlate` call
    pub fn correlation(&self) -> &[f32] {
        &self.correlation
    }
}

fn zero_pad(input: &[f32], buffer: &mut [Complex32]) {
    let (head, tail) = buffer.split_at_mut(input.len());
    for (b, &x) in head.iter_mut().zip(input) {
        *b = Complex32::new(x, 0.0);
    }
    tail.fill(Complex32::new(0.0, 0.0));
}

/// `out[k] = x1[k] * conj(x2[k])`
pub fn cross_power_spectrum(x1: &[Complex32], x2: &[Complex32], out: &mut [Complex32]) {
    for ((g, a), b) in out.iter_mut().zip(x1).zip(x2) {
        *g = a * b.conj();
    }
}

/// Normalize every bin to unit magnitude, `g / (|g| + epsilon)`
///
/// Bins with zero magnitude stay zero.
pub fn phat_whiten(spectrum: &mut [Complex32], epsilon: f32) {
    for g in spectrum.iter_mut() {
        let scale = g.norm() + epsilon;
        *g /= scale;
    }
}

/// Rotate a correlation so zero lag moves from index 0 to index `len / 2`
pub fn center_zero_lag(correlation: &mut [f32]) {
    let half = correlation.len() / 2;
    correlation.rotate_right(half);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(len: usize, seed: u32) -> Vec<f32> {
        // Deterministic broadband sequence (LCG), zero-mean
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv { (i, v) } else { (bi, bv) }
            })
            .0
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(SpectralCorrelator::new(1000, 1e-12).is_err());
        assert!(SpectralCorrelator::new(64, 0.0).is_err());

        let mut corr = SpectralCorrelator::new(64, 1e-12).unwrap();
        assert!(corr.correlate(&[], &[]).is_err());
        assert!(corr.correlate(&[0.0; 8], &[0.0; 9]).is_err());
        assert!(corr.correlate(&[0.0; 33], &[0.0; 33]).is_err());
        assert!(corr.correlate(&[0.0; 32], &[0.0; 32]).is_ok());
    }

    #[test]
    fn test_whitened_magnitude_is_unity() {
        let mut corr = SpectralCorrelator::new(512, 1e-12).unwrap();
        let x1 = structured(256, 1);
        let x2 = structured(256, 2);
        corr.correlate(&x1, &x2).unwrap();

        for (k, g) in corr.whitened_spectrum().iter().enumerate() {
            assert!(
                (g.norm() - 1.0).abs() < 1e-3,
                "bin {} magnitude {}",
                k,
                g.norm()
            );
        }
    }

    #[test]
    fn test_whiten_keeps_nulls_finite() {
        let mut spectrum = vec![
            Complex32::new(0.0, 0.0),
            Complex32::new(3.0, 4.0),
            Complex32::new(1e-30, 0.0),
        ];
        phat_whiten(&mut spectrum, 1e-12);
        assert_eq!(spectrum[0], Complex32::new(0.0, 0.0));
        assert!((spectrum[1].norm() - 1.0).abs() < 1e-6);
        assert!(spectrum[2].norm() < 1e-6);
        assert!(spectrum.iter().all(|g| g.re.is_finite() && g.im.is_finite()));
    }

    #[test]
    fn test_identical_channels_peak_at_center() {
        let mut corr = SpectralCorrelator::new(256, 1e-12).unwrap();
        let x = structured(128, 7);
        let r = corr.correlate(&x, &x).unwrap();
        assert_eq!(argmax(r), 128);
        assert!((r[128] - 1.0).abs() < 1e-3, "peak {}", r[128]);
    }

    #[test]
    fn test_delayed_channel_sign() {
        let mut corr = SpectralCorrelator::new(256, 1e-12).unwrap();
        let source = structured(160, 3);
        let d = 5;
        // Channel 1 hears the wavefront d samples after channel 2
        let late: Vec<f32> = source[..128].to_vec();
        let early: Vec<f32> = source[d..128 + d].to_vec();

        let r = corr.correlate(&late, &early).unwrap();
        assert_eq!(argmax(r), 128 + d);

        let r = corr.correlate(&early, &late).unwrap();
        assert_eq!(argmax(r), 128 - d);
    }

    #[test]
    fn test_center_zero_lag() {
        let mut r = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        center_zero_lag(&mut r);
        assert_eq!(r, vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_cross_power_spectrum() {
        let a = [Complex32::new(1.0, 2.0)];
        let b = [Complex32::new(3.0, -1.0)];
        let mut out = [Complex32::new(0.0, 0.0)];
        cross_power_spectrum(&a, &b, &mut out);
        // (1 + 2i)(3 + i) = 1 + 7i
        assert_eq!(out[0], Complex32::new(1.0, 7.0));
    }
}

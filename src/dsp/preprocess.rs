use std::f32::consts::PI;

use crate::error::{DoaError, Result};

/// Per-channel DC removal and raised-cosine (Hann) windowing.
///
/// The window is computed once for a fixed frame length; `process` is a
/// straight pass over the input with no allocation.
pub struct Preprocessor {
    window: Vec<f32>,
}

impl Preprocessor {
    pub fn new(frame_len: usize) -> Result<Self> {
        if frame_len < 2 {
            return Err(DoaError::InvalidArgument(format!(
                "window length must be at least 2, got {}",
                frame_len
            )));
        }

        let denom = (frame_len - 1) as f32;
        let window = (0..frame_len)
            .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
            .collect();

        Ok(Self { window })
    }

    pub fn frame_len(&self) -> usize {
        self.window.len()
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// `output = (input - mean(input)) * window`
    pub fn process(&self, input: &[f32], output: &mut [f32]) -> Result<()> {
        let n = self.window.len();
        if input.len() != n || output.len() != n {
            return Err(DoaError::LengthMismatch {
                expected: n,
                actual: if input.len() != n {
                    input.len()
                } else {
                    output.len()
                },
            });
        }

        // Accumulate in f64 so long frames keep a precise mean
        let mean = (input.iter().map(|&x| x as f64).sum::<f64>() / n as f64) as f32;

        for ((out, &x), &w) in output.iter_mut().zip(input).zip(&self.window) {
            *out = (x - mean) * w;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_shape() {
        let pre = Preprocessor::new(1024).unwrap();
        let w = pre.window();
        assert!(w[0].abs() < 1e-6);
        assert!(w[1023].abs() < 1e-6);
        // Peak sits between the two middle samples for even lengths
        assert!(w[511] > 0.999 && w[512] > 0.999);
        for i in 0..512 {
            assert!((w[i] - w[1023 - i]).abs() < 1e-5, "window not symmetric at {}", i);
        }
    }

    #[test]
    fn test_rejects_short_frame() {
        assert!(Preprocessor::new(0).is_err());
        assert!(Preprocessor::new(1).is_err());
        assert!(Preprocessor::new(2).is_ok());
    }

    #[test]
    fn test_removes_dc_before_windowing() {
        let pre = Preprocessor::new(256).unwrap();
        let input = vec![3.0f32; 256];
        let mut output = vec![1.0f32; 256];
        pre.process(&input, &mut output).unwrap();
        for &y in &output {
            assert!(y.abs() < 1e-5, "constant input should vanish, got {}", y);
        }
    }

    #[test]
    fn test_output_bounded_by_windowed_input() {
        let pre = Preprocessor::new(128).unwrap();
        let input: Vec<f32> = (0..128)
            .map(|i| 0.2 + (i as f32 * 0.37).sin() * 0.7)
            .collect();
        let mut output = vec![0.0f32; 128];
        pre.process(&input, &mut output).unwrap();

        let mean = input.iter().sum::<f32>() / 128.0;
        for i in 0..128 {
            let bound = (input[i] - mean).abs() * pre.window()[i];
            assert!(output[i].abs() <= bound + 1e-6);
        }
    }

    #[test]
    fn test_length_mismatch_leaves_output() {
        let pre = Preprocessor::new(16).unwrap();
        let input = vec![1.0f32; 15];
        let mut output = vec![0.5f32; 16];
        assert!(pre.process(&input, &mut output).is_err());
        assert!(output.iter().all(|&v| v == 0.5));
    }
}

use serde::Serialize;

use super::{AngleEstimator, PeakAnalyzer, Preprocessor, SpectralCorrelator};
use crate::acquisition::Frame;
use crate::config::DoaConfig;
use crate::error::{DoaError, Result};

/// One frame's delay and bearing estimate
///
/// `sub_sample_lag`, `time_delta` and `angle_deg` are only meaningful when
/// `valid` is set; otherwise they are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EstimationResult {
    pub sub_sample_lag: f32,
    pub time_delta: f32,
    pub angle_deg: f32,
    pub peak_magnitude: f32,
    pub peak_ratio: f32,
    pub valid: bool,
}

/// GCC-PHAT time-delay estimator: preprocess, correlate, pick, convert.
///
/// Owns every per-frame scratch buffer, so `estimate` never allocates.
pub struct GccPhatEstimator {
    preprocessor: Preprocessor,
    correlator: SpectralCorrelator,
    peak: PeakAnalyzer,
    angle: AngleEstimator,
    y1: Vec<f32>,
    y2: Vec<f32>,
}

impl GccPhatEstimator {
    pub fn new(
        preprocessor: Preprocessor,
        correlator: SpectralCorrelator,
        peak: PeakAnalyzer,
        angle: AngleEstimator,
    ) -> Result<Self> {
        let frame_len = preprocessor.frame_len();
        if frame_len * 2 > correlator.fft_len() {
            return Err(DoaError::InvalidArgument(format!(
                "fft_len {} too short for frame_len {}",
                correlator.fft_len(),
                frame_len
            )));
        }
        Ok(Self {
            preprocessor,
            correlator,
            peak,
            angle,
            y1: vec![0.0; frame_len],
            y2: vec![0.0; frame_len],
        })
    }

    pub fn from_config(config: &DoaConfig) -> Result<Self> {
        config.validate()?;

        let max_lag = config.max_lag_samples();
        log::debug!(
            "GCC-PHAT: N={} L={} max lag ±{} samples",
            config.acquisition.frame_len,
            config.estimator.fft_len,
            max_lag
        );

        Self::new(
            Preprocessor::new(config.acquisition.frame_len)?,
            SpectralCorrelator::new(config.estimator.fft_len, config.estimator.phat_epsilon)?,
            PeakAnalyzer::from_config(&config.estimator, max_lag),
            AngleEstimator::from_config(&config.geometry, config.acquisition.sample_rate),
        )
    }

    pub fn frame_len(&self) -> usize {
        self.y1.len()
    }

    pub fn max_lag(&self) -> usize {
        self.peak.max_lag()
    }

    /// Centered correlation from the last estimate
    pub fn correlation(&self) -> &[f32] {
        self.correlator.correlation()
    }

    pub fn estimate(&mut self, frame: &Frame) -> Result<EstimationResult> {
        if frame.len() != self.frame_len() || frame.ch2.len() != frame.ch1.len() {
            return Err(DoaError::LengthMismatch {
                expected: self.frame_len(),
                actual: frame.len(),
            });
        }

        self.preprocessor.process(&frame.ch1, &mut self.y1)?;
        self.preprocessor.process(&frame.ch2, &mut self.y2)?;
        let correlation = self.correlator.correlate(&self.y1, &self.y2)?;
        let peak = self.peak.analyze(correlation)?;

        let mut result = EstimationResult {
            peak_magnitude: peak.peak,
            peak_ratio: peak.ratio,
            ..Default::default()
        };

        if let Some(lag) = peak.refined_lag {
            let (time_delta, angle_deg) = self.angle.estimate(lag);
            result.sub_sample_lag = lag;
            result.time_delta = time_delta;
            result.angle_deg = angle_deg;
            result.valid = true;
        }

        Ok(result)
    }
}

use crate::config::{EstimatorConfig, PeakPolarity};
use crate::constants::{INTERPOLATION_EPSILON, RATIO_EPSILON};
use crate::error::{DoaError, Result};

/// Outcome of a constrained peak search over a centered correlation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakAnalysis {
    /// Index of the strongest sample inside the lag window
    pub index: usize,
    /// Whole-sample lag of that index relative to the center
    pub lag: isize,
    /// Peak score (V1)
    pub peak: f32,
    /// Strongest score outside the exclusion band (V2)
    pub secondary: f32,
    /// V1 / (V2 + ε)
    pub ratio: f32,
    pub valid: bool,
    /// Sub-sample lag; only computed for a valid peak
    pub refined_lag: Option<f32>,
}

/// Physically constrained peak search with a confidence gate.
///
/// Only lags within `±max_lag` samples of the center are considered. The
/// secondary peak skips samples within `exclusion` of the primary so that
/// the primary's own main lobe is not counted as ambiguity.
#[derive(Debug, Clone)]
pub struct PeakAnalyzer {
    max_lag: usize,
    exclusion: usize,
    peak_floor: f32,
    ratio_floor: f32,
    polarity: PeakPolarity,
}

impl PeakAnalyzer {
    pub fn new(
        max_lag: usize,
        exclusion: usize,
        peak_floor: f32,
        ratio_floor: f32,
        polarity: PeakPolarity,
    ) -> Self {
        Self {
            max_lag,
            exclusion,
            peak_floor,
            ratio_floor,
            polarity,
        }
    }

    pub fn from_config(config: &EstimatorConfig, max_lag: usize) -> Self {
        Self::new(
            max_lag,
            config.peak_exclusion,
            config.peak_floor,
            config.ratio_floor,
            config.peak_polarity,
        )
    }

    pub fn max_lag(&self) -> usize {
        self.max_lag
    }

    fn score(&self, v: f32) -> f32 {
        match self.polarity {
            PeakPolarity::Magnitude => v.abs(),
            PeakPolarity::Signed => v,
        }
    }

    pub fn analyze(&self, correlation: &[f32]) -> Result<PeakAnalysis> {
        let len = correlation.len();
        let center = len / 2;
        // One neighbour on each side of the window for interpolation
        if len == 0 || self.max_lag + 1 > center || center + self.max_lag + 1 >= len {
            return Err(DoaError::InvalidArgument(format!(
                "lag window ±{} does not fit in a correlation of {} samples",
                self.max_lag, len
            )));
        }

        let lo = center - self.max_lag;
        let hi = center + self.max_lag;

        let mut index = lo;
        let mut peak = self.score(correlation[lo]);
        for (i, &v) in correlation.iter().enumerate().take(hi + 1).skip(lo + 1) {
            let s = self.score(v);
            if s > peak {
                peak = s;
                index = i;
            }
        }

        let secondary = (lo..=hi)
            .filter(|&i| i.abs_diff(index) > self.exclusion)
            .map(|i| self.score(correlation[i]))
            .fold(0.0f32, f32::max);

        let ratio = peak / (secondary + RATIO_EPSILON);
        let valid = peak >= self.peak_floor && ratio >= self.ratio_floor;

        let refined_lag = valid.then(|| {
            let offset = parabolic_offset(
                self.score(correlation[index - 1]),
                peak,
                self.score(correlation[index + 1]),
            );
            index as f32 + offset - center as f32
        });

        Ok(PeakAnalysis {
            index,
            lag: index as isize - center as isize,
            peak,
            secondary,
            ratio,
            valid,
            refined_lag,
        })
    }
}

/// Vertex offset of the parabola through `(-1, ym)`, `(0, y0)`, `(1, yp)`
///
/// Clamped to ±0.5; a flat or degenerate triple gives 0. The numerator is
/// `yp - ym` (the true vertex), the opposite sign of the firmware's formula.
pub fn parabolic_offset(ym: f32, y0: f32, yp: f32) -> f32 {
    let denom = 2.0 * (2.0 * y0 - ym - yp);
    if !denom.is_finite() || denom.abs() < INTERPOLATION_EPSILON {
        return 0.0;
    }
    ((yp - ym) / denom).clamp(-0.5, 0.5)
}

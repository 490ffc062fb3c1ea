use crate::config::TrackerConfig;
use crate::dsp::EstimationResult;

/// Exponentially smoothed bearing that holds its value on invalid frames
#[derive(Debug, Clone)]
pub struct BearingTracker {
    alpha: f32,
    smoothed_angle: f32,
}

impl BearingTracker {
    /// Start at broadside (0°)
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            smoothed_angle: 0.0,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.alpha)
    }

    pub fn smoothed_angle(&self) -> f32 {
        self.smoothed_angle
    }

    /// Smoothed angle that `update` would produce, without committing it
    ///
    /// `None` for invalid or non-finite estimates.
    pub fn peek(&self, estimate: &EstimationResult) -> Option<f32> {
        if !estimate.valid || !estimate.angle_deg.is_finite() {
            return None;
        }
        Some(self.alpha * estimate.angle_deg + (1.0 - self.alpha) * self.smoothed_angle)
    }

    /// Fold in one estimate; returns whether the state moved
    pub fn update(&mut self, estimate: &EstimationResult) -> bool {
        match self.peek(estimate) {
            Some(angle) => {
                self.smoothed_angle = angle;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(angle_deg: f32, valid: bool) -> EstimationResult {
        EstimationResult {
            angle_deg,
            valid,
            ..Default::default()
        }
    }

    #[test]
    fn test_smoothing_step() {
        let mut tracker = BearingTracker::new(0.2);
        assert!(tracker.update(&estimate(30.0, true)));
        assert!((tracker.smoothed_angle() - 6.0).abs() < 1e-6);
        tracker.update(&estimate(30.0, true));
        assert!((tracker.smoothed_angle() - 10.8).abs() < 1e-5);
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut tracker = BearingTracker::new(0.2);
        for _ in 0..100 {
            tracker.update(&estimate(-45.0, true));
        }
        assert!((tracker.smoothed_angle() + 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_frames_freeze_state() {
        let mut tracker = BearingTracker::new(0.2);
        tracker.update(&estimate(20.0, true));
        let held = tracker.smoothed_angle();

        for angle in [80.0, -80.0, 0.0, f32::NAN] {
            assert!(!tracker.update(&estimate(angle, false)));
            assert_eq!(tracker.smoothed_angle(), held);
        }
    }

    #[test]
    fn test_peek_does_not_commit() {
        let mut tracker = BearingTracker::new(0.5);
        tracker.update(&estimate(40.0, true));

        assert_eq!(tracker.peek(&estimate(0.0, true)), Some(10.0));
        assert_eq!(tracker.peek(&estimate(0.0, false)), None);
        assert_eq!(tracker.smoothed_angle(), 20.0);

        tracker.update(&estimate(0.0, true));
        assert_eq!(tracker.smoothed_angle(), 10.0);
    }
}

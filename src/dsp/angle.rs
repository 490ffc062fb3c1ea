use crate::config::GeometryConfig;

/// Converts a lag in samples to a bearing relative to broadside.
///
/// 0° is perpendicular to the microphone baseline; +90° points along the
/// baseline toward microphone 2 (the side channel 1 hears last).
#[derive(Debug, Clone, Copy)]
pub struct AngleEstimator {
    sample_rate: f32,
    mic_distance_m: f32,
    sound_speed_mps: f32,
}

impl AngleEstimator {
    pub fn new(sample_rate: f32, mic_distance_m: f32, sound_speed_mps: f32) -> Self {
        Self {
            sample_rate,
            mic_distance_m,
            sound_speed_mps,
        }
    }

    pub fn from_config(geometry: &GeometryConfig, sample_rate: u32) -> Self {
        Self::new(
            sample_rate as f32,
            geometry.mic_distance_m,
            geometry.sound_speed_mps,
        )
    }

    pub fn time_delta(&self, lag_samples: f32) -> f32 {
        lag_samples / self.sample_rate
    }

    /// Bearing in degrees for a time delay, in [-90, 90]
    ///
    /// Delays beyond the geometric limit saturate at ±90°.
    pub fn angle_deg(&self, time_delta: f32) -> f32 {
        let sin_theta = (self.sound_speed_mps * time_delta / self.mic_distance_m).clamp(-1.0, 1.0);
        sin_theta.asin().to_degrees()
    }

    /// `(time_delta, angle_deg)` for a lag in samples
    pub fn estimate(&self, lag_samples: f32) -> (f32, f32) {
        let dt = self.time_delta(lag_samples);
        (dt, self.angle_deg(dt))
    }

    /// Lag in samples for a source at `angle_deg`, the inverse mapping
    pub fn lag_for_angle(&self, angle_deg: f32) -> f32 {
        let dt = angle_deg.to_radians().sin() * self.mic_distance_m / self.sound_speed_mps;
        dt * self.sample_rate
    }
}

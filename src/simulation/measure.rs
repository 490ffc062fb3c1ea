use crate::acquisition::DoubleBuffer;
use crate::config::DoaConfig;
use crate::error::Result;
use crate::pipeline::{DiagnosticsEmitter, Orchestrator};
use crate::tracking::RecordingActuator;

use super::{NoiseConfig, generate_noisy_test_signal};

/// Summary of a pipeline run over a synthetic recording
#[derive(Debug, Clone, Default)]
pub struct BearingMeasurement {
    pub frames: usize,
    pub valid_frames: usize,
    /// Mean of the per-frame angles of valid frames
    pub mean_angle: Option<f32>,
    pub smoothed_angle: f32,
    /// Servo angle of the last issued command
    pub actuator_angle: f32,
}

impl BearingMeasurement {
    pub fn valid_fraction(&self) -> f32 {
        if self.frames == 0 {
            0.0
        } else {
            self.valid_frames as f32 / self.frames as f32
        }
    }
}

pub fn angle_error(measured: f32, expected: f32) -> f32 {
    measured - expected
}

/// Feed an interleaved signal through the double buffer and orchestrator
pub fn measure_bearing(signal: &[f32], config: &DoaConfig) -> Result<BearingMeasurement> {
    let (mut producer, consumer) = DoubleBuffer::<f32>::from_config(&config.acquisition)?;
    let mut orch = Orchestrator::new(
        config,
        consumer,
        RecordingActuator::new(),
        DiagnosticsEmitter::disabled(),
    )?;

    let mut measurement = BearingMeasurement::default();
    let mut angles = Vec::new();

    for chunk in signal.chunks_exact(config.acquisition.frame_len * 2) {
        producer.write(chunk);
        while let Some(outcome) = orch.poll()? {
            measurement.frames += 1;
            if outcome.estimate.valid {
                measurement.valid_frames += 1;
                angles.push(outcome.estimate.angle_deg);
            }
        }
    }

    if !angles.is_empty() {
        measurement.mean_angle = Some(angles.iter().sum::<f32>() / angles.len() as f32);
    }
    measurement.smoothed_angle = orch.smoothed_angle();
    measurement.actuator_angle = orch.command().angle_deg;
    Ok(measurement)
}

#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub max_error: f32,
    pub mean_error: f32,
    /// Bearings for which no frame passed the confidence gate
    pub missed: usize,
}

pub fn measure_error_across_bearings(
    noise_config: &NoiseConfig,
    config: &DoaConfig,
    test_bearings: &[f32],
    duration_secs: f32,
) -> Result<ErrorStats> {
    let mut errors = Vec::new();
    let mut missed = 0;

    for &bearing in test_bearings {
        let signal = generate_noisy_test_signal(
            duration_secs,
            config.acquisition.sample_rate,
            bearing,
            &config.geometry,
            noise_config,
        );
        match measure_bearing(&signal, config)?.mean_angle {
            Some(angle) => errors.push(angle_error(angle, bearing).abs()),
            None => missed += 1,
        }
    }

    let mean_error = if errors.is_empty() {
        0.0
    } else {
        errors.iter().sum::<f32>() / errors.len() as f32
    };

    Ok(ErrorStats {
        max_error: errors.iter().fold(0.0f32, |a, &b| a.max(b)),
        mean_error,
        missed,
    })
}

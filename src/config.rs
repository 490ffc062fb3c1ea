//! Configuration for the earshot bearing tracker.
//!
//! All parameters are fixed at startup. Defaults match the reference
//! hardware: two microphones 12 cm apart sampled at 48 kHz in 1024-sample
//! frames, driving a 0-180° hobby servo.
//!
//! ## Channel Assignment
//!
//! The acquisition block is interleaved `[mic1, mic2, mic1, mic2, ...]` by
//! default. If the wiring is reversed, set `mic1_channel` to
//! `ChannelRole::Right` instead of swapping cables:
//!
//! ```ignore
//! mic1_channel: ChannelRole::Right,
//! ```
//!
//! ## TOML
//!
//! Every section may be omitted or partially specified:
//!
//! ```
//! use earshot::config::DoaConfig;
//!
//! let config = DoaConfig::from_toml_str(
//!     r#"
//!     [geometry]
//!     mic_distance_m = 0.2
//!
//!     [estimator]
//!     peak_floor = 0.2
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.acquisition.sample_rate, 48000);
//! assert!((config.geometry.mic_distance_m - 0.2).abs() < 1e-6);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::PHAT_EPSILON;
use crate::error::{DoaError, Result};

/// Microphone spacing specification
///
/// Accepts a bare number in metres or an explicit unit suffix.
///
/// # Parsing formats
/// - `0.12` - metres (no suffix)
/// - `0.12m` - metres (explicit)
/// - `12cm` - centimetres
/// - `120mm` - millimetres
///
/// # Example
/// ```
/// use earshot::config::Spacing;
///
/// let spacing: Spacing = "12cm".parse().unwrap();
/// assert!((spacing.as_meters() - 0.12).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Spacing(f32);

impl Spacing {
    /// Create from a distance in metres
    pub fn from_meters(m: f32) -> Self {
        Self(m)
    }

    /// Get distance in metres
    pub fn as_meters(&self) -> f32 {
        self.0
    }
}

impl fmt::Display for Spacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}m", self.0)
    }
}

impl FromStr for Spacing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();

        let (num, scale) = if let Some(num) = s.strip_suffix("mm") {
            (num, 0.001)
        } else if let Some(num) = s.strip_suffix("cm") {
            (num, 0.01)
        } else if let Some(num) = s.strip_suffix('m') {
            (num, 1.0)
        } else {
            (s, 1.0)
        };

        let value: f32 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid spacing: {}", s))?;
        if value <= 0.0 || !value.is_finite() {
            return Err("spacing must be positive".to_string());
        }
        Ok(Self::from_meters(value * scale))
    }
}

/// Channel assignment for the interleaved acquisition block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    /// First slot of each interleaved pair (index 0)
    Left,
    /// Second slot of each interleaved pair (index 1)
    Right,
}

/// Which value of the correlation sequence counts as "the" peak
///
/// The two conventions disagree when the correlation has a negative lobe
/// larger than its positive one, e.g. when one microphone is wired with
/// inverted polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeakPolarity {
    /// Largest absolute value (polarity-agnostic)
    Magnitude,
    /// Largest signed value (only in-phase arrivals count)
    Signed,
}

/// System-wide configuration
///
/// Use `DoaConfig::default()` for the reference hardware and adjust fields
/// as needed, then call [`DoaConfig::validate`] before building a pipeline.
///
/// # Example
/// ```
/// use earshot::config::DoaConfig;
///
/// let mut config = DoaConfig::default();
/// config.tracker.alpha = 0.5;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DoaConfig {
    /// Acquisition (frame source) configuration
    pub acquisition: AcquisitionConfig,
    /// Microphone geometry and propagation
    pub geometry: GeometryConfig,
    /// GCC-PHAT estimator configuration
    pub estimator: EstimatorConfig,
    /// Angle smoothing configuration
    pub tracker: TrackerConfig,
    /// Actuator range configuration
    pub actuator: ActuatorConfig,
    /// Diagnostic output configuration
    pub diagnostics: DiagnosticsConfig,
}

/// Acquisition configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Sample rate in Hz (typically 48000)
    pub sample_rate: u32,
    /// Samples per channel in one frame (N)
    pub frame_len: usize,
    /// Number of interleaved channels (must be 2)
    pub channels: u16,
    /// Which interleaved slot carries microphone 1
    pub mic1_channel: ChannelRole,
}

/// Microphone geometry
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    /// Distance between the two microphones in metres
    pub mic_distance_m: f32,
    /// Speed of sound in metres per second
    pub sound_speed_mps: f32,
}

/// GCC-PHAT estimator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// FFT length L (power of two, at least twice the frame length)
    pub fft_len: usize,
    /// Guard added to |G[k]| during PHAT whitening
    pub phat_epsilon: f32,
    /// Minimum main peak value for a valid estimate
    pub peak_floor: f32,
    /// Minimum main/secondary peak ratio for a valid estimate
    pub ratio_floor: f32,
    /// Half-width in samples of the band around the main peak that is
    /// skipped when searching for the secondary peak
    pub peak_exclusion: usize,
    /// Peak search convention
    pub peak_polarity: PeakPolarity,
}

/// Angle smoothing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Exponential smoothing factor in (0, 1); higher follows faster
    pub alpha: f32,
    /// Actuator angle that corresponds to broadside (bearing 0°)
    pub center_offset_deg: f32,
}

/// Actuator mechanical range
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActuatorConfig {
    /// Lowest reachable actuator angle in degrees
    pub min_angle_deg: f32,
    /// Highest reachable actuator angle in degrees
    pub max_angle_deg: f32,
    /// Pulse width at `min_angle_deg` in microseconds
    pub min_pulse_us: f32,
    /// Pulse width at `max_angle_deg` in microseconds
    pub max_pulse_us: f32,
}

/// Diagnostic output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Emit one diagnostic record every this many processed frames
    pub period_frames: usize,
    /// Capacity of the record channel to the printer thread
    pub channel_capacity: usize,
}

impl DoaConfig {
    /// Parse a configuration from TOML text, filling unspecified fields with defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DoaError::Config(e.to_string()))
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DoaError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Largest physically possible inter-microphone delay in samples (M)
    pub fn max_lag_samples(&self) -> usize {
        self.geometry
            .max_lag_samples(self.acquisition.sample_rate as f32)
    }

    /// Check every parameter; the pipeline assumes a validated configuration
    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        if acq.sample_rate == 0 {
            return Err(DoaError::Config("sample_rate must be positive".into()));
        }
        if acq.frame_len < 2 {
            return Err(DoaError::Config(format!(
                "frame_len must be at least 2, got {}",
                acq.frame_len
            )));
        }
        if acq.channels != 2 {
            return Err(DoaError::Config(format!(
                "exactly 2 channels required, got {}",
                acq.channels
            )));
        }

        let geo = &self.geometry;
        if !(geo.mic_distance_m.is_finite() && geo.mic_distance_m > 0.0) {
            return Err(DoaError::Config("mic_distance_m must be positive".into()));
        }
        if !(geo.sound_speed_mps.is_finite() && geo.sound_speed_mps > 0.0) {
            return Err(DoaError::Config("sound_speed_mps must be positive".into()));
        }

        let est = &self.estimator;
        if !est.fft_len.is_power_of_two() {
            return Err(DoaError::Config(format!(
                "fft_len must be a power of two, got {}",
                est.fft_len
            )));
        }
        if est.fft_len < 2 * acq.frame_len {
            return Err(DoaError::Config(format!(
                "fft_len {} must be at least twice frame_len {}",
                est.fft_len, acq.frame_len
            )));
        }
        if !(est.phat_epsilon.is_finite() && est.phat_epsilon > 0.0) {
            return Err(DoaError::Config("phat_epsilon must be positive".into()));
        }
        if !est.peak_floor.is_finite() || !est.ratio_floor.is_finite() || est.ratio_floor < 0.0 {
            return Err(DoaError::Config(
                "peak_floor and ratio_floor must be finite, ratio_floor non-negative".into(),
            ));
        }
        let max_lag = self.max_lag_samples();
        // The search window plus one interpolation neighbour must stay inside
        // one half of the centered correlation.
        if max_lag + 1 >= est.fft_len / 2 {
            return Err(DoaError::Config(format!(
                "lag window ±{} does not fit in fft_len {}",
                max_lag, est.fft_len
            )));
        }

        let trk = &self.tracker;
        if !(trk.alpha > 0.0 && trk.alpha < 1.0) {
            return Err(DoaError::Config(format!(
                "alpha must be in (0, 1), got {}",
                trk.alpha
            )));
        }
        if !trk.center_offset_deg.is_finite() {
            return Err(DoaError::Config("center_offset_deg must be finite".into()));
        }

        let act = &self.actuator;
        if !(act.min_angle_deg.is_finite()
            && act.max_angle_deg.is_finite()
            && act.min_angle_deg < act.max_angle_deg)
        {
            return Err(DoaError::Config(
                "actuator angle range must satisfy min < max".into(),
            ));
        }
        if !(act.min_pulse_us.is_finite()
            && act.max_pulse_us.is_finite()
            && act.min_pulse_us < act.max_pulse_us)
        {
            return Err(DoaError::Config(
                "actuator pulse range must satisfy min < max".into(),
            ));
        }

        if self.diagnostics.period_frames == 0 {
            return Err(DoaError::Config("diagnostic period must be positive".into()));
        }
        if self.diagnostics.channel_capacity == 0 {
            return Err(DoaError::Config(
                "diagnostic channel capacity must be positive".into(),
            ));
        }

        Ok(())
    }
}

impl AcquisitionConfig {
    /// Time covered by one frame; the pipeline deadline
    pub fn buffer_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_len as f64 / self.sample_rate as f64)
    }

    /// Whether interleaved slot 1 (rather than slot 0) carries microphone 1
    pub fn swapped(&self) -> bool {
        self.mic1_channel == ChannelRole::Right
    }
}

impl GeometryConfig {
    /// Largest possible delay in seconds (d / c)
    pub fn max_time_delta(&self) -> f32 {
        self.mic_distance_m / self.sound_speed_mps
    }

    /// Largest possible delay in whole samples plus one: `floor(d / c * fs) + 1`
    pub fn max_lag_samples(&self, sample_rate: f32) -> usize {
        (self.max_time_delta() * sample_rate).floor() as usize + 1
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_len: 1024,
            channels: 2,
            mic1_channel: ChannelRole::Left,
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            mic_distance_m: 0.12,
            sound_speed_mps: 343.0,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            fft_len: 2048,
            phat_epsilon: PHAT_EPSILON,
            peak_floor: 0.15,
            ratio_floor: 1.5,
            peak_exclusion: 2,
            peak_polarity: PeakPolarity::Magnitude,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            center_offset_deg: 90.0,
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: 0.0,
            max_angle_deg: 180.0,
            min_pulse_us: 500.0,
            max_pulse_us: 2500.0,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            period_frames: 10,
            channel_capacity: 64,
        }
    }
}

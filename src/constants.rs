//! Numeric constants for signal processing stability
//!
//! These constants define thresholds and epsilon values used throughout
//! the GCC-PHAT pipeline so that no stage ever produces a non-finite value.

/// Default guard added to the cross-power magnitude before PHAT whitening.
/// Keeps bins with a spectral null at zero instead of dividing by zero.
pub const PHAT_EPSILON: f32 = 1e-12;

/// Minimum magnitude of the parabolic interpolation denominator.
/// Below this the three points are treated as flat and the offset is zero.
pub const INTERPOLATION_EPSILON: f32 = 1e-10;

/// Guard added to the secondary peak before forming the peak ratio.
pub const RATIO_EPSILON: f32 = 1e-12;

/// Mid-scale code of an unsigned 16-bit converter, used as the zero level.
pub const U16_MID_SCALE: f32 = 32768.0;

/// Full-scale magnitude of a signed 16-bit sample.
pub const I16_FULL_SCALE: f32 = 32768.0;

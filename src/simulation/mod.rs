mod measure;
mod noise;
mod signal;

pub use measure::{
    BearingMeasurement, ErrorStats, angle_error, measure_bearing, measure_error_across_bearings,
};
pub use noise::{
    AdditiveNoiseConfig, NoiseConfig, ReflectionConfig, apply_noise, generate_noisy_test_signal,
    signal_power,
};
pub use signal::{
    SINC_HALF_WIDTH, SOURCE_AMPLITUDE, deinterleave, delay_signal, generate_source_pair,
    generate_test_signal, interleave, white_noise,
};

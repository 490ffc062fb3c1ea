use earshot::config::{DoaConfig, PeakPolarity};
use earshot::simulation::{
    NoiseConfig, deinterleave, generate_noisy_test_signal, generate_source_pair,
};
use earshot::{EstimationResult, Frame, GccPhatEstimator};

fn estimate_first_frame(config: &DoaConfig, bearing: f32, noise: &NoiseConfig) -> EstimationResult {
    let signal = generate_noisy_test_signal(
        0.1,
        config.acquisition.sample_rate,
        bearing,
        &config.geometry,
        noise,
    );
    let n = config.acquisition.frame_len;
    let (ch1, ch2) = deinterleave(&signal[..2 * n]);
    let mut estimator = GccPhatEstimator::from_config(config).unwrap();
    estimator
        .estimate(&Frame::from_channels(ch1, ch2).unwrap())
        .unwrap()
}

#[test]
fn test_uncorrelated_channels_are_rejected() {
    let mut estimator = GccPhatEstimator::from_config(&DoaConfig::default()).unwrap();
    for seed in 0..3u64 {
        let (ch1, _) = generate_source_pair(1024, 0.0, Some(seed));
        let (_, ch2) = generate_source_pair(1024, 0.0, Some(seed + 1000));
        let result = estimator
            .estimate(&Frame::from_channels(ch1, ch2).unwrap())
            .unwrap();
        assert!(
            !result.valid,
            "seed {}: peak {} ratio {}",
            seed,
            result.peak_magnitude,
            result.peak_ratio
        );
        assert!(result.peak_magnitude < 0.15);
    }
}

#[test]
fn test_silence_is_rejected() {
    let mut estimator = GccPhatEstimator::from_config(&DoaConfig::default()).unwrap();
    let result = estimator.estimate(&Frame::new(1024)).unwrap();
    assert!(!result.valid);
    assert!(result.sub_sample_lag.is_finite());
    assert!(result.angle_deg.is_finite());
}

#[test]
fn test_equal_strength_reflection_is_ambiguous() {
    let config = DoaConfig::default();
    let noise = NoiseConfig::default()
        .with_seed(11)
        .with_reflection(-20.0, 1.0, 0.0);
    let result = estimate_first_frame(&config, 20.0, &noise);

    assert!(
        result.peak_ratio < config.estimator.ratio_floor,
        "ratio {}",
        result.peak_ratio
    );
    assert!(!result.valid);
}

#[test]
fn test_weak_reflection_keeps_direct_path() {
    let config = DoaConfig::default();
    let noise = NoiseConfig::default()
        .with_seed(12)
        .with_reflection(-40.0, 0.3, 0.0);
    let result = estimate_first_frame(&config, 25.0, &noise);

    assert!(result.valid, "ratio {}", result.peak_ratio);
    assert!(
        (result.angle_deg - 25.0).abs() < 3.0,
        "angle {}",
        result.angle_deg
    );
}

#[test]
fn test_moderate_awgn_still_valid() {
    let config = DoaConfig::default();
    let noise = NoiseConfig::default().with_seed(13).with_awgn(10.0);
    let result = estimate_first_frame(&config, -35.0, &noise);

    assert!(result.valid, "peak {} ratio {}", result.peak_magnitude, result.peak_ratio);
    assert!(
        (result.angle_deg + 35.0).abs() < 3.0,
        "angle {}",
        result.angle_deg
    );
}

#[test]
fn test_inverted_microphone_depends_on_polarity() {
    let (ch1, ch2) = generate_source_pair(1024, 8.0, Some(14));
    let inverted: Vec<f32> = ch2.iter().map(|v| -v).collect();
    let frame = Frame::from_channels(ch1, inverted).unwrap();

    let magnitude = DoaConfig::default();
    assert_eq!(magnitude.estimator.peak_polarity, PeakPolarity::Magnitude);
    let result = GccPhatEstimator::from_config(&magnitude)
        .unwrap()
        .estimate(&frame)
        .unwrap();
    assert!(result.valid);
    assert!((result.sub_sample_lag - 8.0).abs() < 0.5, "lag {}", result.sub_sample_lag);

    let mut signed = DoaConfig::default();
    signed.estimator.peak_polarity = PeakPolarity::Signed;
    let result = GccPhatEstimator::from_config(&signed)
        .unwrap()
        .estimate(&frame)
        .unwrap();
    assert!(!result.valid, "peak {}", result.peak_magnitude);
}

#[test]
fn test_inverted_recording_tracks_under_magnitude() {
    let noise = NoiseConfig::default().with_seed(15).with_inverted_channel2();
    let result = estimate_first_frame(&DoaConfig::default(), 30.0, &noise);
    assert!(result.valid);
    assert!((result.angle_deg - 30.0).abs() < 3.0, "angle {}", result.angle_deg);
}

use earshot::config::DoaConfig;
use earshot::simulation::generate_source_pair;
use earshot::{Frame, GccPhatEstimator};

fn estimate_lag(estimator: &mut GccPhatEstimator, lag: f32, seed: u64) -> (f32, bool) {
    let (ch1, ch2) = generate_source_pair(estimator.frame_len(), lag, Some(seed));
    let frame = Frame::from_channels(ch1, ch2).unwrap();
    let result = estimator.estimate(&frame).unwrap();
    (result.sub_sample_lag, result.valid)
}

#[test]
fn test_integer_delays_across_physical_range() {
    let config = DoaConfig::default();
    let max_lag = config.max_lag_samples() as i32;
    assert_eq!(max_lag, 17);

    let mut estimator = GccPhatEstimator::from_config(&config).unwrap();
    for d in -max_lag..=max_lag {
        let (lag, valid) = estimate_lag(&mut estimator, d as f32, (100 + d) as u64);
        assert!(valid, "d={} should be valid", d);
        assert!((lag - d as f32).abs() < 0.5, "d={}: estimated {}", d, lag);
    }
}

#[test]
fn test_lag_sign_follows_which_channel_lags() {
    let mut estimator = GccPhatEstimator::from_config(&DoaConfig::default()).unwrap();

    // Microphone 1 hears the source late
    let (ch1, ch2) = generate_source_pair(1024, 7.0, Some(1));
    let late = estimator
        .estimate(&Frame::from_channels(ch1.clone(), ch2.clone()).unwrap())
        .unwrap();
    assert!((late.sub_sample_lag - 7.0).abs() < 0.5);
    assert!(late.angle_deg > 0.0);

    // Same capture with the microphones exchanged
    let early = estimator
        .estimate(&Frame::from_channels(ch2, ch1).unwrap())
        .unwrap();
    assert!((early.sub_sample_lag + 7.0).abs() < 0.5);
    assert!(
        (early.angle_deg + late.angle_deg).abs() < 0.5,
        "{} vs {}",
        early.angle_deg,
        late.angle_deg
    );
}

#[test]
fn test_fractional_delays_are_refined() {
    let mut estimator = GccPhatEstimator::from_config(&DoaConfig::default()).unwrap();
    for &lag in &[-9.5f32, -3.25, 2.7, 10.4, 14.6] {
        let (estimated, valid) = estimate_lag(&mut estimator, lag, 7);
        assert!(valid, "lag {} should be valid", lag);
        assert!(
            (estimated - lag).abs() < 0.4,
            "lag {}: estimated {}",
            lag,
            estimated
        );
    }
}

#[test]
fn test_channel_gain_does_not_move_peak() {
    let mut estimator = GccPhatEstimator::from_config(&DoaConfig::default()).unwrap();
    let (ch1, ch2) = generate_source_pair(1024, 5.0, Some(3));

    let loud = estimator
        .estimate(&Frame::from_channels(ch1.clone(), ch2.clone()).unwrap())
        .unwrap();
    let quiet_ch1: Vec<f32> = ch1.iter().map(|v| v * 0.01).collect();
    let quiet = estimator
        .estimate(&Frame::from_channels(quiet_ch1, ch2).unwrap())
        .unwrap();

    assert!(loud.valid && quiet.valid);
    assert!((loud.sub_sample_lag - quiet.sub_sample_lag).abs() < 0.01);
    assert!((loud.peak_magnitude - quiet.peak_magnitude).abs() < 0.01);
}

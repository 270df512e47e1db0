//! Matching of synthetic measurement streams.

use lhgeo_core::synthetic::lighthouse::{
    bs0_pose, bs1_pose, bs2_pose, cf1_pose, cf2_pose, cf_origin_pose, synthesize_angles,
    synthesize_measurements,
};
use lhgeo_core::{match_measurements, MatcherConfig, SensorGeometry};

#[test]
fn visits_become_samples() {
    let sensors = SensorGeometry::deck();
    let stations = [(4, bs0_pose()), (1, bs1_pose()), (9, bs2_pose())];
    let platforms = [cf_origin_pose(), cf1_pose(), cf2_pose()];
    let stream = synthesize_measurements(&sensors, &platforms, &stations, 0.5, 0.004);

    let samples = match_measurements(&stream, &MatcherConfig::default());
    assert_eq!(samples.len(), 3);
    for (sample, platform) in samples.iter().zip(platforms.iter()) {
        assert_eq!(sample.bs_count(), 3);
        for (id, bs) in &stations {
            assert_eq!(sample.angles[id], synthesize_angles(&sensors, platform, bs));
        }
    }
}

#[test]
fn slow_stations_are_split() {
    let sensors = SensorGeometry::deck();
    let stations = [(0, bs0_pose()), (1, bs1_pose())];
    // 30 ms between stations exceeds the default window
    let stream = synthesize_measurements(&sensors, &[cf1_pose()], &stations, 1.0, 0.030);
    let config = MatcherConfig {
        min_stations: 2,
        ..MatcherConfig::default()
    };
    assert!(match_measurements(&stream, &config).is_empty());
}

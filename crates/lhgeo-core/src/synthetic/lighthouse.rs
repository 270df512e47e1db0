//! Known base station and platform poses with matching bearings.
//!
//! Sample 0 of every scene built here is taken at the origin, so poses
//! estimated from it live directly in the fixture frame.

use crate::{
    AngleVector, AngleVectorSet, BsId, MatchedSample, Measurement, Pose, Real, SensorGeometry,
    Vec3,
};
use std::f64::consts::{FRAC_PI_2, PI};

/// Looks along +X from `(-2, 1, 3)`.
pub fn bs0_pose() -> Pose {
    Pose::from_translation(Vec3::new(-2.0, 1.0, 3.0))
}

/// Looks along +Y from `(0, -2, 3)`.
pub fn bs1_pose() -> Pose {
    Pose::from_rot_vec(Vec3::new(0.0, 0.0, FRAC_PI_2), Vec3::new(0.0, -2.0, 3.0))
}

/// Looks along -Y from `(0, 2, 3)`.
pub fn bs2_pose() -> Pose {
    Pose::from_rot_vec(Vec3::new(0.0, 0.0, -FRAC_PI_2), Vec3::new(0.0, 2.0, 3.0))
}

/// Looks along -X from `(2, 0, 2)`.
pub fn bs3_pose() -> Pose {
    Pose::from_rot_vec(Vec3::new(0.0, 0.0, PI), Vec3::new(2.0, 0.0, 2.0))
}

pub fn cf_origin_pose() -> Pose {
    Pose::identity()
}

pub fn cf1_pose() -> Pose {
    Pose::from_translation(Vec3::new(0.3, 0.2, 0.1))
}

/// Yawed a quarter turn at `(1, 0, 0)`.
pub fn cf2_pose() -> Pose {
    Pose::from_rot_vec(Vec3::new(0.0, 0.0, FRAC_PI_2), Vec3::new(1.0, 0.0, 0.0))
}

/// Bearings from `bs` to each sensor of a platform at `platform`.
pub fn synthesize_angles(sensors: &SensorGeometry, platform: &Pose, bs: &Pose) -> AngleVectorSet {
    AngleVectorSet::new(sensors.positions.map(|s| {
        let global = platform.rotate_translate(&s);
        AngleVector::from_cart(&bs.inverse_rotate_translate(&global))
    }))
}

/// One sample at `platform` seen by each `(id, pose)` station.
pub fn synthesize_sample(
    sensors: &SensorGeometry,
    timestamp: Real,
    platform: &Pose,
    stations: &[(BsId, Pose)],
) -> MatchedSample {
    let mut sample = MatchedSample::new(timestamp);
    for (id, bs) in stations {
        sample.insert(*id, synthesize_angles(sensors, platform, bs));
    }
    sample
}

/// A measurement stream visiting `platforms` in order.
///
/// Stations report `station_period` seconds apart within a visit and visits
/// are `visit_period` seconds apart.
pub fn synthesize_measurements(
    sensors: &SensorGeometry,
    platforms: &[Pose],
    stations: &[(BsId, Pose)],
    visit_period: Real,
    station_period: Real,
) -> Vec<Measurement> {
    let mut out = Vec::with_capacity(platforms.len() * stations.len());
    for (i, platform) in platforms.iter().enumerate() {
        let t0 = i as Real * visit_period;
        for (j, (id, bs)) in stations.iter().enumerate() {
            out.push(Measurement::new(
                t0 + j as Real * station_period,
                *id,
                synthesize_angles(sensors, platform, bs),
            ));
        }
    }
    out
}

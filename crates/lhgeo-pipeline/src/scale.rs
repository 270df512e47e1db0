//! Uniform rescaling of an aligned system.
//!
//! The solved geometry is only metric up to the accuracy of the tiny sensor
//! baseline. A single factor is estimated and applied to every translation;
//! rotations are left untouched.

use lhgeo_core::{AngleVector, MatchedSample, Pose, Real, SystemPoses, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("estimated reference length {0} cannot be scaled")]
    Degenerate(Real),
    #[error("no beam hits the sensor plane")]
    NoIntersections,
}

/// Poses after scaling together with the applied factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaled {
    pub poses: SystemPoses,
    pub factor: Real,
}

pub struct SystemScaler;

impl SystemScaler {
    /// Scale so that `actual`, the estimated position of a physical
    /// reference point, lies as far from the origin as `expected`.
    pub fn scale_fixed_point(
        poses: &SystemPoses,
        expected: &Vec3,
        actual: &Vec3,
    ) -> Result<Scaled, ScaleError> {
        Self::scale_to(poses, expected.norm(), actual.norm())
    }

    /// Scale so that the sensor diagonals reconstructed from the beams match
    /// `expected_diagonal`.
    ///
    /// `poses.sample_poses[i]` is the pose of `samples[i]`. Stations missing
    /// from `poses` and beams parallel to the deck are skipped.
    pub fn scale_diagonals(
        poses: &SystemPoses,
        samples: &[MatchedSample],
        expected_diagonal: Real,
    ) -> Result<Scaled, ScaleError> {
        let mut diagonals = Vec::new();
        for (platform, sample) in poses.sample_poses.iter().zip(samples) {
            for (id, angles) in &sample.angles {
                let Some(bs) = poses.bs_poses.get(id) else {
                    continue;
                };
                for (a, b) in [(0, 3), (1, 2)] {
                    if let Some(d) = intersection_distance(&angles[a], &angles[b], bs, platform) {
                        diagonals.push(d);
                    }
                }
            }
        }
        if diagonals.is_empty() {
            return Err(ScaleError::NoIntersections);
        }
        let estimated = diagonals.iter().sum::<Real>() / diagonals.len() as Real;
        Self::scale_to(poses, expected_diagonal, estimated)
    }

    pub fn scale_system(poses: &SystemPoses, factor: Real) -> Scaled {
        Scaled {
            poses: poses.scaled(factor),
            factor,
        }
    }

    fn scale_to(poses: &SystemPoses, expected: Real, estimated: Real) -> Result<Scaled, ScaleError> {
        if !(estimated.is_finite() && estimated > Real::EPSILON) {
            return Err(ScaleError::Degenerate(estimated));
        }
        let factor = expected / estimated;
        debug!("scaling system by {factor}");
        Ok(Self::scale_system(poses, factor))
    }
}

/// Where the beam of `bs` along `angles` crosses the z = 0 plane of `platform`.
pub fn deck_intersection(angles: &AngleVector, bs: &Pose, platform: &Pose) -> Option<Vec3> {
    let normal = platform.rotation * Vec3::z();
    let dir = bs.rotation * angles.cart();
    let denom = dir.dot(&normal);
    if denom.abs() < 1e-12 {
        return None;
    }
    let along = (platform.translation - bs.translation).dot(&normal) / denom;
    Some(bs.translation + dir * along)
}

fn intersection_distance(a: &AngleVector, b: &AngleVector, bs: &Pose, platform: &Pose) -> Option<Real> {
    let p1 = deck_intersection(a, bs, platform)?;
    let p2 = deck_intersection(b, bs, platform)?;
    Some((p1 - p2).norm())
}

use crate::ippe::{solve_ippe, IppeError};
use lhgeo_core::{AngleVectorSet, BsId, MatchedSample, Mat3, Pose, Real, SensorGeometry, Vec2, Vec3};
use std::collections::BTreeMap;
use thiserror::Error;

/// Camera-convention frame (X right, Y down, Z forward) to base station
/// frame (X forward, Y left, Z up).
fn camera_to_bs() -> Mat3 {
    #[rustfmt::skip]
    let m = Mat3::new(
        0.0, 0.0, 1.0,
        -1.0, 0.0, 0.0,
        0.0, -1.0, 0.0,
    );
    m
}

/// Both pose hypotheses of a base station in the platform frame of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsPosePair {
    /// Hypothesis with the smaller reprojection error.
    pub first: Pose,
    pub second: Pose,
}

impl BsPosePair {
    pub fn get(&self, index: usize) -> &Pose {
        if index == 0 {
            &self.first
        } else {
            &self.second
        }
    }

    pub fn as_array(&self) -> [Pose; 2] {
        [self.first, self.second]
    }
}

/// Base station pose from the bearings of one station to the sensor plane.
///
/// Wraps the IPPE solver: the sensors are the planar model and the bearing
/// projections are the image, with the base station acting as the camera.
#[derive(Debug, Clone, Copy)]
pub struct PlanarPoseSolver;

impl PlanarPoseSolver {
    /// The two hypotheses for the base station pose in the platform frame.
    pub fn solve(sensors: &SensorGeometry, angles: &AngleVectorSet) -> Result<BsPosePair, IppeError> {
        let image: Vec<Vec2> = angles.projections().iter().map(|p| -*p).collect();
        let [a, b] = solve_ippe(&sensors.positions, &image)?;
        Ok(BsPosePair {
            first: bs_in_platform(&a.rotation, &a.translation),
            second: bs_in_platform(&b.rotation, &b.translation),
        })
    }

    /// Reprojection errors of both hypotheses, for diagnostics.
    pub fn reprojection_errors(
        sensors: &SensorGeometry,
        angles: &AngleVectorSet,
    ) -> Result<(Real, Real), IppeError> {
        let image: Vec<Vec2> = angles.projections().iter().map(|p| -*p).collect();
        let [a, b] = solve_ippe(&sensors.positions, &image)?;
        Ok((a.reproj_error, b.reproj_error))
    }
}

/// `rotation`, `translation` map platform points into the camera frame.
fn bs_in_platform(rotation: &Mat3, translation: &Vec3) -> Pose {
    let c = camera_to_bs();
    let platform_in_bs = Pose::from_rotation_matrix(&(c * rotation), c * translation);
    platform_in_bs.inverse()
}

/// A sample together with the pose hypotheses of every visible station.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedSample {
    pub sample: MatchedSample,
    pub hypotheses: BTreeMap<BsId, BsPosePair>,
}

impl AugmentedSample {
    pub fn bs_ids(&self) -> impl Iterator<Item = BsId> + '_ {
        self.hypotheses.keys().copied()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("planar pose estimation failed for base station {bs_id}: {source}")]
pub struct AugmentError {
    pub bs_id: BsId,
    #[source]
    pub source: IppeError,
}

/// Solve IPPE for every station of `sample`.
pub fn augment_sample(
    sample: &MatchedSample,
    sensors: &SensorGeometry,
) -> Result<AugmentedSample, AugmentError> {
    let hypotheses = sample
        .angles
        .iter()
        .map(|(id, angles)| {
            PlanarPoseSolver::solve(sensors, angles)
                .map(|pair| (*id, pair))
                .map_err(|source| AugmentError { bs_id: *id, source })
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(AugmentedSample {
        sample: sample.clone(),
        hypotheses,
    })
}

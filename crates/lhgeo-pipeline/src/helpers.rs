//! Individual estimation steps for custom workflows.
//!
//! [`crate::estimate_geometry`] runs a fixed sequence over tagged
//! recordings. These functions expose the steps separately, with sample
//! roles given by index, so intermediate results can be inspected or
//! stages swapped out.
//!
//! ```ignore
//! use lhgeo_pipeline::helpers::*;
//!
//! let (initial, solution) = solve_samples(&samples, &config)?;
//! println!("{}", solution.summary());
//! let aligned = align_to_samples(&solution.poses, 0, &[1], &[2], &config)?;
//! ```

use crate::{EstimationConfig, SystemScaler};
use anyhow::{ensure, Context, Result};
use lhgeo_core::{MatchedSample, Pose, Real, SystemPoses, Vec3};
use lhgeo_linear::{InitialEstimate, InitialEstimator};
use lhgeo_optim::{GeometrySolution, GeometrySolver, SystemAligner};

/// Initial estimate followed by bundle adjustment.
///
/// `solution.poses.sample_poses[i]` belongs to `initial.samples[i]`; samples
/// rejected as outliers are not part of the solution.
pub fn solve_samples(
    samples: &[MatchedSample],
    config: &EstimationConfig,
) -> Result<(InitialEstimate, GeometrySolution)> {
    let initial = InitialEstimator::new(config.initial)
        .estimate(samples, &config.sensors)
        .context("initial estimate failed")?;
    let solution = GeometrySolver::new(config.solver)
        .solve(&initial.poses, &initial.matched_samples(), &config.sensors)
        .context("geometry refinement failed")?;
    Ok((initial, solution))
}

/// Align `poses` using its own sample poses as reference points.
///
/// Returns the transformed poses and the applied transform.
pub fn align_to_samples(
    poses: &SystemPoses,
    origin: usize,
    x_axis: &[usize],
    xy_plane: &[usize],
    config: &EstimationConfig,
) -> Result<(SystemPoses, Pose)> {
    let position = |i: usize| -> Result<Vec3> {
        poses
            .sample_poses
            .get(i)
            .map(|p| p.translation)
            .with_context(|| format!("no sample pose with index {i}"))
    };
    let origin = position(origin)?;
    let x_axis = x_axis.iter().map(|i| position(*i)).collect::<Result<Vec<_>>>()?;
    let xy_plane = xy_plane.iter().map(|i| position(*i)).collect::<Result<Vec<_>>>()?;
    let alignment = SystemAligner::new(config.alignment)
        .align(&origin, &x_axis, &xy_plane, &poses.bs_poses)
        .context("alignment failed")?;
    Ok((poses.transformed(&alignment.transform), alignment.transform))
}

/// Scale an aligned system so that sample `reference` lies `distance` from the origin.
pub fn scale_to_reference(poses: &SystemPoses, reference: usize, distance: Real) -> Result<SystemPoses> {
    ensure!(distance > 0.0, "reference distance must be positive, got {distance}");
    let actual = poses
        .sample_poses
        .get(reference)
        .with_context(|| format!("no sample pose with index {reference}"))?
        .translation;
    let scaled = SystemScaler::scale_fixed_point(poses, &Vec3::new(distance, 0.0, 0.0), &actual)?;
    Ok(scaled.poses)
}

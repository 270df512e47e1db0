//! Alignment of an estimated system with the physical world.
//!
//! The solved geometry lives in the frame of the first sample. A rigid
//! transform is fitted so that the origin sample lands at `(0, 0, 0)`, the
//! x-axis samples on the X axis and the xy-plane samples at `z = 0`. The
//! least-squares fit cannot tell a solution from its half-turn about X or Z,
//! so the result is flipped to put the x-axis samples at positive X and the
//! base stations above the floor.

use crate::{LmBackend, NllsProblem, NllsSolverBackend, SolveOptions};
use lhgeo_core::{rotate_by_rot_vec, BsId, Pose, Real, Vec3};
use log::{debug, warn};
use nalgebra::{convert, DMatrix, DVector, RealField, SVector, Vector3};
use num_dual::{jacobian, DualSVec64};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub max_iters: usize,
    /// Used for the cost, step and gradient tolerances of the fit.
    pub tolerance: Real,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignError {
    #[error("alignment needs at least one x-axis and one xy-plane point")]
    MissingReferencePoints,
}

/// Output of [`SystemAligner::align`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// Maps the input frame to the aligned frame.
    pub transform: Pose,
    pub bs_poses: BTreeMap<BsId, Pose>,
}

struct AlignmentProblem<'a> {
    origin: Vec3,
    x_axis: &'a [Vec3],
    xy_plane: &'a [Vec3],
}

const ALIGN_PARAMS: usize = 6;

impl AlignmentProblem<'_> {
    /// Origin (3), then y and z of every x-axis point, then z of every
    /// xy-plane point, all after applying the transform in `x`.
    fn residuals_generic<T: RealField>(&self, x: &[T]) -> DVector<T> {
        let rv = Vector3::new(x[0].clone(), x[1].clone(), x[2].clone());
        let t = Vector3::new(x[3].clone(), x[4].clone(), x[5].clone());
        let apply = |p: &Vec3| rotate_by_rot_vec(&rv, &p.map(convert::<Real, T>)) + &t;

        let mut r = Vec::with_capacity(self.num_residuals());
        r.extend(apply(&self.origin).iter().cloned());
        for p in self.x_axis {
            let q = apply(p);
            r.extend([q.y.clone(), q.z.clone()]);
        }
        for p in self.xy_plane {
            r.push(apply(p).z.clone());
        }
        DVector::from_vec(r)
    }
}

impl NllsProblem for AlignmentProblem<'_> {
    fn num_params(&self) -> usize {
        ALIGN_PARAMS
    }

    fn num_residuals(&self) -> usize {
        3 + 2 * self.x_axis.len() + self.xy_plane.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.residuals_generic(x.as_slice())
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let x0 = SVector::<Real, ALIGN_PARAMS>::from_column_slice(x.as_slice());
        let (_, j) = jacobian(
            |p: SVector<DualSVec64<ALIGN_PARAMS>, ALIGN_PARAMS>| {
                self.residuals_generic(p.as_slice())
            },
            x0,
        );
        DMatrix::from_column_slice(j.nrows(), ALIGN_PARAMS, j.as_slice())
    }
}

fn params_to_pose(x: &DVector<Real>) -> Pose {
    Pose::from_rot_vec(Vec3::new(x[0], x[1], x[2]), Vec3::new(x[3], x[4], x[5]))
}

#[derive(Debug, Clone, Default)]
pub struct SystemAligner {
    pub config: AlignmentConfig,
}

impl SystemAligner {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    /// Find the aligning transform and apply it to `bs_poses`.
    ///
    /// The above-floor check uses the station with the smallest id.
    pub fn align(
        &self,
        origin: &Vec3,
        x_axis: &[Vec3],
        xy_plane: &[Vec3],
        bs_poses: &BTreeMap<BsId, Pose>,
    ) -> Result<Alignment, AlignError> {
        if x_axis.is_empty() || xy_plane.is_empty() {
            return Err(AlignError::MissingReferencePoints);
        }
        let raw = self.fit(origin, x_axis, xy_plane);
        let transform = de_flip(raw, x_axis, bs_poses);
        let bs_poses = bs_poses
            .iter()
            .map(|(id, pose)| (*id, transform.compose(pose)))
            .collect();
        Ok(Alignment {
            transform,
            bs_poses,
        })
    }

    fn fit(&self, origin: &Vec3, x_axis: &[Vec3], xy_plane: &[Vec3]) -> Pose {
        let problem = AlignmentProblem {
            origin: *origin,
            x_axis,
            xy_plane,
        };
        let opts = SolveOptions {
            max_iters: self.config.max_iters,
            ftol: self.config.tolerance,
            gtol: self.config.tolerance,
            xtol: self.config.tolerance,
        };
        let (x, report) = LmBackend.solve(&problem, DVector::zeros(ALIGN_PARAMS), &opts);
        if !report.converged {
            warn!(
                "alignment fit did not converge, cost {:e}",
                report.final_cost
            );
        }
        params_to_pose(&x)
    }
}

fn de_flip(raw: Pose, x_axis: &[Vec3], bs_poses: &BTreeMap<BsId, Pose>) -> Pose {
    let mut transform = raw;

    let x_mean = x_axis.iter().sum::<Vec3>() / x_axis.len() as Real;
    if raw.rotate_translate(&x_mean).x < 0.0 {
        debug!("x-axis points at negative X, flipping about Z");
        let flip = Pose::from_rot_vec(Vec3::new(0.0, 0.0, PI), Vec3::zeros());
        transform = flip.compose(&transform);
    }

    if let Some(bs) = bs_poses.values().next() {
        if raw.rotate_translate(&bs.translation).z < 0.0 {
            debug!("base stations below the floor, flipping about X");
            let flip = Pose::from_rot_vec(Vec3::new(PI, 0.0, 0.0), Vec3::zeros());
            transform = flip.compose(&transform);
        }
    }
    transform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_points() {
        let aligner = SystemAligner::default();
        let bs = BTreeMap::from([(0, Pose::from_translation(Vec3::new(0.0, 0.0, 2.0)))]);
        let origin = Vec3::zeros();
        let x = [Vec3::new(1.0, 0.0, 0.0)];
        assert_eq!(
            aligner.align(&origin, &[], &x, &bs).unwrap_err(),
            AlignError::MissingReferencePoints
        );
        assert_eq!(
            aligner.align(&origin, &x, &[], &bs).unwrap_err(),
            AlignError::MissingReferencePoints
        );
    }

    #[test]
    fn de_flip_rotates_both_axes() {
        // x-axis at negative X and the station below the floor
        let raw = Pose::identity();
        let bs = BTreeMap::from([(3, Pose::from_translation(Vec3::new(0.0, 0.0, -1.0)))]);
        let t = de_flip(raw, &[Vec3::new(-1.0, 0.0, 0.0)], &bs);
        assert!(t.rotate_translate(&Vec3::new(-1.0, 0.0, 0.0)).x > 0.0);
        assert!(t.rotate_translate(&Vec3::new(0.0, 0.0, -1.0)).z > 0.0);
    }

    #[test]
    fn dual_jacobian_matches_differences() {
        let x_axis = [Vec3::new(1.0, 0.2, -0.1), Vec3::new(2.0, -0.1, 0.3)];
        let xy = [Vec3::new(0.4, 0.9, 0.05)];
        let problem = AlignmentProblem {
            origin: Vec3::new(0.1, -0.2, 0.05),
            x_axis: &x_axis,
            xy_plane: &xy,
        };
        let x = DVector::from_vec(vec![0.1, -0.2, 0.3, 0.5, -0.4, 0.2]);
        let j = problem.jacobian(&x);
        assert_eq!(j.shape(), (problem.num_residuals(), ALIGN_PARAMS));
        let h = 1e-6;
        for c in 0..ALIGN_PARAMS {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[c] += h;
            minus[c] -= h;
            let column = (problem.residuals(&plus) - problem.residuals(&minus)) / (2.0 * h);
            assert!((j.column(c) - column).amax() < 1e-7, "column {}", c);
        }
    }

    #[test]
    fn fit_residual_layout() {
        let x_axis = [Vec3::new(1.0, 2.0, 3.0)];
        let xy = [Vec3::new(4.0, 5.0, 6.0), Vec3::new(7.0, 8.0, 9.0)];
        let problem = AlignmentProblem {
            origin: Vec3::new(-1.0, -2.0, -3.0),
            x_axis: &x_axis,
            xy_plane: &xy,
        };
        let r = problem.residuals(&DVector::zeros(6));
        assert_eq!(r.len(), problem.num_residuals());
        assert_eq!(r.as_slice(), &[-1.0, -2.0, -3.0, 2.0, 3.0, 6.0, 9.0]);
    }
}

//! Bundle adjustment of base station and platform poses.
//!
//! Unknowns are one rotation vector plus translation per base station and
//! per sample. Sample 0 is held at identity and defines the global frame.
//! Each (sample, station) pair is one factor of 8 residuals, one per sensor
//! and sweep axis:
//!
//! ```text
//! r = tan(predicted - measured) * |t_bs - t_sample|
//! ```
//!
//! which approximates the metric distance of the sensor from the measured
//! light plane. A factor only touches its station's and its sample's
//! parameter blocks, so the problem is solved with sparse
//! Levenberg-Marquardt and autodiff Jacobians.

use crate::factors::{sweep_residuals_generic, SweepFactor, POSE_DIM, SWEEP_RESIDUALS};
use crate::{ErrorInfo, GeometrySolution};
use lhgeo_core::{BsId, BsIndexMap, MatchedSample, Pose, Real, SensorGeometry, SystemPoses, Vec3};
use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// Sparse linear solver used inside each Levenberg-Marquardt step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    #[default]
    SparseCholesky,
    SparseQR,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySolverConfig {
    /// Iteration cap; the initial guess is expected to be close.
    ///
    /// One iteration is one linearization of the problem. A solve that
    /// uses up the cap is reported as not converged.
    pub max_iters: usize,
    /// Stop once an iteration lowers the cost by less than this fraction.
    pub ftol: Real,
    /// Stop once the cost drops below this.
    pub min_cost: Real,
    pub linear_solver: LinearSolverKind,
}

impl Default for GeometrySolverConfig {
    fn default() -> Self {
        Self {
            max_iters: 10,
            ftol: 1e-8,
            min_cost: 1e-20,
            linear_solver: LinearSolverKind::SparseCholesky,
        }
    }
}

impl GeometrySolverConfig {
    fn optimizer_options(&self) -> OptimizerOptions {
        OptimizerOptions {
            max_iteration: self.max_iters,
            linear_solver_type: match self.linear_solver {
                LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
                LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
            },
            // absolute decrease is meaningless at metre-squared cost scale
            min_abs_error_decrease_threshold: 0.0,
            min_rel_error_decrease_threshold: self.ftol,
            min_error_threshold: self.min_cost,
            ..OptimizerOptions::default()
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometrySolveError {
    #[error("no samples to solve for")]
    NoSamples,
    #[error("no initial pose for base station {0}")]
    MissingBsPose(BsId),
    #[error("expected {expected} initial sample poses, got {got}")]
    SamplePoseCount { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
struct Block {
    sample: usize,
    bs: usize,
    measured: [Real; SWEEP_RESIDUALS],
}

fn blocks_of(samples: &[MatchedSample], index: &BsIndexMap) -> Vec<Block> {
    let mut blocks = Vec::new();
    for (sample_idx, sample) in samples.iter().enumerate() {
        for (id, angles) in &sample.angles {
            if let Some(bs) = index.index_of(*id) {
                blocks.push(Block {
                    sample: sample_idx,
                    bs,
                    measured: angles.angle_list(),
                });
            }
        }
    }
    blocks
}

fn bs_key(bs: usize) -> String {
    format!("bs/{}", bs)
}

fn sample_key(sample: usize) -> String {
    format!("sample/{}", sample)
}

fn pose_to_params(pose: &Pose) -> DVector<Real> {
    let rv = pose.rot_vec();
    let t = pose.translation;
    DVector::from_column_slice(&[rv.x, rv.y, rv.z, t.x, t.y, t.z])
}

fn params_to_pose(x: &DVector<Real>) -> Pose {
    Pose::from_rot_vec(Vec3::new(x[0], x[1], x[2]), Vec3::new(x[3], x[4], x[5]))
}

/// Jointly refines base station and platform poses against all measured angles.
#[derive(Debug, Clone, Default)]
pub struct GeometrySolver {
    pub config: GeometrySolverConfig,
}

impl GeometrySolver {
    pub fn new(config: GeometrySolverConfig) -> Self {
        Self { config }
    }

    /// Refine `initial` against `samples`.
    ///
    /// `initial.sample_poses[i]` is the guess for `samples[i]`; the pose of
    /// sample 0 is held at identity. Every station seen in `samples` needs an
    /// initial pose. Stations that only appear in `initial` are left out.
    pub fn solve(
        &self,
        initial: &SystemPoses,
        samples: &[MatchedSample],
        sensors: &SensorGeometry,
    ) -> Result<GeometrySolution, GeometrySolveError> {
        if samples.is_empty() {
            return Err(GeometrySolveError::NoSamples);
        }
        if initial.sample_poses.len() != samples.len() {
            return Err(GeometrySolveError::SamplePoseCount {
                expected: samples.len(),
                got: initial.sample_poses.len(),
            });
        }
        let index = BsIndexMap::from_samples(samples);
        for id in index.ids() {
            if !initial.bs_poses.contains_key(id) {
                return Err(GeometrySolveError::MissingBsPose(*id));
            }
        }
        for id in initial.bs_poses.keys() {
            if index.index_of(*id).is_none() {
                warn!("base station {} has no observations, leaving it out", id);
            }
        }

        let blocks = blocks_of(samples, &index);
        let mut problem = Problem::new();
        let mut initial_map: HashMap<String, DVector<Real>> = HashMap::new();
        for (i, id) in index.ids().iter().enumerate() {
            initial_map.insert(bs_key(i), pose_to_params(&initial.bs_poses[id]));
        }
        for block in &blocks {
            let key = sample_key(block.sample);
            if initial_map.contains_key(&key) {
                continue;
            }
            if block.sample == 0 {
                initial_map.insert(key.clone(), pose_to_params(&Pose::identity()));
                for i in 0..POSE_DIM {
                    problem.fix_variable(&key, i);
                }
            } else {
                initial_map.insert(key, pose_to_params(&initial.sample_poses[block.sample]));
            }
        }

        let linearizations = Arc::new(AtomicUsize::new(0));
        for (k, block) in blocks.iter().enumerate() {
            let factor = SweepFactor {
                sensors: sensors.positions,
                measured: block.measured,
                // one factor is enough to count how often the problem is linearized
                linearizations: (k == 0).then(|| Arc::clone(&linearizations)),
            };
            problem.add_residual_block(
                SWEEP_RESIDUALS,
                &[bs_key(block.bs).as_str(), sample_key(block.sample).as_str()],
                Box::new(factor),
                None,
            );
        }

        info!(
            "solving geometry: {} base stations, {} samples, {} residuals",
            index.len(),
            samples.len(),
            blocks.len() * SWEEP_RESIDUALS
        );
        let optimizer = LevenbergMarquardtOptimizer::default();
        let solution = optimizer.optimize(
            &problem,
            &initial_map,
            Some(self.config.optimizer_options()),
        );
        let iterations = linearizations.load(Ordering::Relaxed);
        let (params, converged) = match solution {
            Some(params) => (params, iterations < self.config.max_iters),
            None => {
                warn!("geometry solver failed, keeping the initial guess");
                (initial_map, false)
            }
        };
        let param_blocks = problem.initialize_parameter_blocks(&params);
        let residuals = problem.compute_residuals(&param_blocks, true);
        let final_cost = 0.5 * residuals.as_ref().squared_norm_l2();
        if converged {
            debug!(
                "geometry converged after {} iterations, cost {:e}",
                iterations, final_cost
            );
        } else {
            warn!(
                "geometry solver did not converge after {} iterations",
                iterations
            );
        }

        let mut bs_poses = BTreeMap::new();
        for (i, id) in index.ids().iter().enumerate() {
            let pose = params
                .get(&bs_key(i))
                .map_or(initial.bs_poses[id], params_to_pose);
            bs_poses.insert(*id, pose);
        }
        let sample_poses: Vec<Pose> = (0..samples.len())
            .map(|i| match params.get(&sample_key(i)) {
                _ if i == 0 => Pose::identity(),
                Some(x) => params_to_pose(x),
                None => initial.sample_poses[i],
            })
            .collect();

        let mut sample_errors = vec![BTreeMap::new(); samples.len()];
        for block in &blocks {
            let Some(id) = index.id_at(block.bs) else {
                continue;
            };
            let r = sweep_residuals_generic(
                pose_to_params(&bs_poses[&id]).as_slice(),
                pose_to_params(&sample_poses[block.sample]).as_slice(),
                &sensors.positions,
                &block.measured,
            );
            sample_errors[block.sample].insert(id, r.norm());
        }
        let error_info = ErrorInfo::from_sample_errors(&sample_errors);

        Ok(GeometrySolution {
            poses: SystemPoses {
                bs_poses,
                sample_poses,
            },
            converged,
            iterations,
            final_cost,
            sample_errors,
            error_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lhgeo_core::synthetic::lighthouse::*;

    fn scene() -> (SensorGeometry, Vec<MatchedSample>, SystemPoses) {
        let sensors = SensorGeometry::deck();
        let samples = vec![
            synthesize_sample(&sensors, 0.0, &cf_origin_pose(), &[(0, bs0_pose()), (1, bs1_pose())]),
            synthesize_sample(&sensors, 1.0, &cf1_pose(), &[(1, bs1_pose()), (2, bs2_pose())]),
        ];
        let truth = SystemPoses {
            bs_poses: BTreeMap::from([(0, bs0_pose()), (1, bs1_pose()), (2, bs2_pose())]),
            sample_poses: vec![cf_origin_pose(), cf1_pose()],
        };
        (sensors, samples, truth)
    }

    #[test]
    fn one_block_per_observation() {
        let (_, samples, _) = scene();
        let index = BsIndexMap::from_samples(&samples);
        let blocks = blocks_of(&samples, &index);
        let pairs: Vec<(usize, usize)> = blocks.iter().map(|b| (b.sample, b.bs)).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (1, 1), (1, 2)]);
    }

    #[test]
    fn ground_truth_is_a_fixed_point() {
        let (sensors, samples, truth) = scene();
        let solution = GeometrySolver::default()
            .solve(&truth, &samples, &sensors)
            .unwrap();
        assert!(solution.converged);
        assert!(solution.final_cost < 1e-20, "cost {}", solution.final_cost);
        assert!(solution.error_info.overall.max < 1e-9);
        assert_eq!(solution.poses.sample_poses[0], Pose::identity());
    }

    #[test]
    fn linear_solver_kinds_agree() {
        let (sensors, samples, truth) = scene();
        let nudge = Pose::from_rot_vec(Vec3::new(0.01, 0.0, -0.01), Vec3::new(0.02, 0.01, 0.0));
        let mut guess = truth.clone();
        for pose in guess.bs_poses.values_mut() {
            *pose = pose.compose(&nudge);
        }
        let solve = |linear_solver| {
            let config = GeometrySolverConfig {
                max_iters: 50,
                linear_solver,
                ..Default::default()
            };
            GeometrySolver::new(config)
                .solve(&guess, &samples, &sensors)
                .unwrap()
        };
        let cholesky = solve(LinearSolverKind::SparseCholesky);
        let qr = solve(LinearSolverKind::SparseQR);
        for id in [0, 1, 2] {
            let a = &cholesky.poses.bs_poses[&id];
            let b = &qr.poses.bs_poses[&id];
            assert!(a.distance_to(b) < 1e-6, "station {} differs", id);
        }
    }

    #[test]
    fn station_without_initial_pose_is_rejected() {
        let (sensors, samples, mut truth) = scene();
        truth.bs_poses.remove(&2);
        let err = GeometrySolver::default()
            .solve(&truth, &samples, &sensors)
            .unwrap_err();
        assert_eq!(err, GeometrySolveError::MissingBsPose(2));
    }

    #[test]
    fn sample_pose_count_must_match() {
        let (sensors, samples, mut truth) = scene();
        truth.sample_poses.pop();
        let err = GeometrySolver::default()
            .solve(&truth, &samples, &sensors)
            .unwrap_err();
        assert_eq!(
            err,
            GeometrySolveError::SamplePoseCount {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            GeometrySolver::default().solve(&truth, &[], &sensors).unwrap_err(),
            GeometrySolveError::NoSamples
        );
    }
}

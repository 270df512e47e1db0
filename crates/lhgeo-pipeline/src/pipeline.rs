//! Full geometry estimation from recorded measurements.
//!
//! Recordings are turned into samples, validated, estimated linearly,
//! refined, aligned with the origin / x-axis / xy-plane samples and finally
//! scaled. The report carries the base station geometries in their persisted
//! shape plus per-sample quality information.

use crate::{EstimationConfig, EstimationError, ScalingConfig, SystemScaler};
use lhgeo_core::crossing_beam::{max_distance_all_permutations, position_all_permutations};
use lhgeo_core::{
    match_measurements, merge_stationary, AngleVectorSet, BsId, MatchedSample, MatcherConfig,
    Measurement, Pose, Real, SampleType, Vec3,
};
use lhgeo_linear::InitialEstimator;
use lhgeo_optim::{ErrorInfo, ErrorStats, GeometrySolver, SystemAligner};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Measurements recorded for one purpose.
///
/// Stationary kinds are merged into a single sample; `XyzSpace`
/// recordings are split into samples by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub kind: SampleType,
    pub measurements: Vec<Measurement>,
}

/// A matched sample tagged with its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedSample {
    pub kind: SampleType,
    pub sample: MatchedSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStatus {
    Ok,
    TooFewBs,
    Ambiguous,
    NoData,
    BsUnknown,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::TooFewBs => "too few base stations",
            Self::Ambiguous => "ambiguous",
            Self::NoData => "no data",
            Self::BsUnknown => "unknown base station",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub kind: SampleType,
    pub timestamp: Real,
    pub bs_ids: Vec<BsId>,
    pub status: SampleStatus,
    /// Platform pose in the final frame, when the sample could be placed.
    pub pose: Option<Pose>,
    /// Largest crossing-beam distance of the sample, metres.
    pub error_distance: Option<Real>,
}

/// Crossing-beam error above which a sample position is not trusted, metres.
pub const LARGE_ERROR_DISTANCE: Real = 0.01;

impl SampleReport {
    /// Whether the crossing-beam error exceeds [`LARGE_ERROR_DISTANCE`].
    pub fn is_error_large(&self) -> bool {
        self.error_distance.is_some_and(|d| d > LARGE_ERROR_DISTANCE)
    }

    fn new(typed: &TypedSample) -> Self {
        let status = if typed.sample.is_empty() {
            SampleStatus::NoData
        } else if typed.sample.bs_count() < 2 {
            SampleStatus::TooFewBs
        } else {
            SampleStatus::Ok
        };
        Self {
            kind: typed.kind,
            timestamp: typed.sample.timestamp,
            bs_ids: typed.sample.bs_ids().collect(),
            status,
            pose: None,
            error_distance: None,
        }
    }
}

/// Base station geometry in the shape it is persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseStationGeometry {
    pub origin: [Real; 3],
    /// Row-major rotation from the station frame to the global frame.
    pub rotation_matrix: [[Real; 3]; 3],
    pub valid: bool,
}

impl BaseStationGeometry {
    pub fn to_pose(&self) -> Pose {
        let r = &self.rotation_matrix;
        let m = lhgeo_core::Mat3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        );
        Pose::from_rotation_matrix(&m, Vec3::from(self.origin))
    }
}

impl From<&Pose> for BaseStationGeometry {
    fn from(pose: &Pose) -> Self {
        let m = pose.rotation_matrix();
        let mut rotation_matrix = [[0.0; 3]; 3];
        for (i, row) in rotation_matrix.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[(i, j)];
            }
        }
        Self {
            origin: pose.translation.into(),
            rotation_matrix,
            valid: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationReport {
    pub geometries: BTreeMap<BsId, BaseStationGeometry>,
    pub bs_poses: BTreeMap<BsId, Pose>,
    /// One entry per sample, in the order of [`collect_samples`].
    pub samples: Vec<SampleReport>,
    /// Maps the frame of the origin sample to the aligned frame (before scaling).
    pub alignment: Pose,
    pub scale: Real,
    pub converged: bool,
    pub iterations: usize,
    pub final_cost: Real,
    /// Solver residual statistics, in the unscaled frame.
    pub error_info: ErrorInfo,
    pub summary: String,
    /// Crossing-beam errors of the samples used in the solution.
    pub solution_stats: Option<ErrorStats>,
    /// Crossing-beam errors of the verification samples.
    pub verification_stats: Option<ErrorStats>,
}

fn kind_rank(kind: SampleType) -> u8 {
    match kind {
        SampleType::Origin => 0,
        SampleType::XAxis => 1,
        SampleType::XyPlane => 2,
        SampleType::XyzSpace => 3,
        SampleType::Verification => 4,
    }
}

/// Turn recordings into samples, ordered origin, x-axis, xy-plane,
/// xyz-space, verification and by recording order within a kind.
pub fn collect_samples(recordings: &[Recording], matcher: &MatcherConfig) -> Vec<TypedSample> {
    let mut ordered: Vec<&Recording> = recordings.iter().collect();
    ordered.sort_by_key(|r| kind_rank(r.kind));

    let mut out = Vec::new();
    for rec in ordered {
        if rec.kind.is_stationary() {
            let sample = merge_stationary(&rec.measurements).unwrap_or_else(|| MatchedSample::new(0.0));
            out.push(TypedSample {
                kind: rec.kind,
                sample,
            });
        } else {
            out.extend(
                match_measurements(&rec.measurements, matcher)
                    .into_iter()
                    .map(|sample| TypedSample {
                        kind: rec.kind,
                        sample,
                    }),
            );
        }
    }
    out
}

/// Run the full estimation on raw recordings.
pub fn estimate_geometry(
    recordings: &[Recording],
    config: &EstimationConfig,
) -> Result<EstimationReport, EstimationError> {
    let samples = collect_samples(recordings, &config.matcher);
    estimate_from_samples(&samples, config)
}

/// Check the reference samples and pick the samples used for estimation.
///
/// Returns indices into `samples` with the origin sample first.
fn validate(
    samples: &[TypedSample],
    reports: &[SampleReport],
) -> Result<Vec<usize>, EstimationError> {
    let count = |kind: SampleType| samples.iter().filter(|s| s.kind == kind).count();
    match count(SampleType::Origin) {
        0 => return Err(EstimationError::MissingSamples(SampleType::Origin)),
        1 => {}
        n => return Err(EstimationError::MultipleOrigins(n)),
    }
    for kind in [SampleType::XAxis, SampleType::XyPlane] {
        if count(kind) == 0 {
            return Err(EstimationError::MissingSamples(kind));
        }
    }

    for (index, (s, r)) in samples.iter().zip(reports).enumerate() {
        if r.status != SampleStatus::Ok && s.kind.is_mandatory() {
            return Err(EstimationError::TooFewStations {
                kind: s.kind,
                index,
                count: s.sample.bs_count(),
            });
        }
    }

    let usable = |(i, s): &(usize, &TypedSample)| {
        s.kind != SampleType::Verification && reports[*i].status == SampleStatus::Ok
    };
    let mut used: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|e| e.1.kind == SampleType::Origin)
        .map(|e| e.0)
        .collect();
    used.extend(
        samples
            .iter()
            .enumerate()
            .filter(|e| e.1.kind != SampleType::Origin && usable(e))
            .map(|e| e.0),
    );
    Ok(used)
}

fn beam_stations(
    bs_poses: &BTreeMap<BsId, Pose>,
    sample: &MatchedSample,
) -> Option<Vec<(Pose, AngleVectorSet)>> {
    sample
        .angles
        .iter()
        .map(|(id, angles)| bs_poses.get(id).map(|p| (*p, *angles)))
        .collect()
}

/// Run the estimation on already matched and tagged samples.
pub fn estimate_from_samples(
    samples: &[TypedSample],
    config: &EstimationConfig,
) -> Result<EstimationReport, EstimationError> {
    let mut reports: Vec<SampleReport> = samples.iter().map(SampleReport::new).collect();
    let used = validate(samples, &reports)?;
    info!(
        "estimating geometry from {} of {} samples",
        used.len(),
        samples.len()
    );

    let matched: Vec<MatchedSample> = used.iter().map(|i| samples[*i].sample.clone()).collect();
    let initial = InitialEstimator::new(config.initial).estimate(&matched, &config.sensors)?;
    for (pos, &index) in used.iter().enumerate() {
        if initial.kept_indices.contains(&pos) {
            continue;
        }
        let kind = samples[index].kind;
        if kind.is_mandatory() {
            return Err(EstimationError::MandatorySampleRejected { kind, index });
        }
        reports[index].status = SampleStatus::Ambiguous;
    }
    // indices into `samples` of the solved samples
    let kept: Vec<usize> = initial.kept_indices.iter().map(|k| used[*k]).collect();
    let kept_samples = initial.matched_samples();

    let solution =
        GeometrySolver::new(config.solver).solve(&initial.poses, &kept_samples, &config.sensors)?;
    debug!("{}", solution.summary());

    let positions_of = |kind: SampleType| -> Vec<Vec3> {
        kept.iter()
            .zip(&solution.poses.sample_poses)
            .filter(|(i, _)| samples[**i].kind == kind)
            .map(|(_, p)| p.translation)
            .collect()
    };
    let origin = positions_of(SampleType::Origin)
        .first()
        .copied()
        .unwrap_or_else(Vec3::zeros);
    let x_axis = positions_of(SampleType::XAxis);
    let xy_plane = positions_of(SampleType::XyPlane);
    let alignment = SystemAligner::new(config.alignment).align(
        &origin,
        &x_axis,
        &xy_plane,
        &solution.poses.bs_poses,
    )?;
    let aligned = solution.poses.transformed(&alignment.transform);

    let scaled = match config.scaling {
        ScalingConfig::None => SystemScaler::scale_system(&aligned, 1.0),
        ScalingConfig::ReferenceDistance { distance } => {
            let reference = kept
                .iter()
                .zip(&aligned.sample_poses)
                .find(|(i, _)| samples[**i].kind == SampleType::XAxis)
                .map(|(_, p)| p.translation)
                .unwrap_or_else(Vec3::zeros);
            SystemScaler::scale_fixed_point(&aligned, &Vec3::new(distance, 0.0, 0.0), &reference)?
        }
        ScalingConfig::SensorDiagonal => SystemScaler::scale_diagonals(
            &aligned,
            &kept_samples,
            config.sensors.diagonal_distance(),
        )?,
    };
    let bs_poses = scaled.poses.bs_poses.clone();

    let mut solution_errors = Vec::new();
    for (&index, pose) in kept.iter().zip(&scaled.poses.sample_poses) {
        let report = &mut reports[index];
        report.pose = Some(*pose);
        report.error_distance = beam_stations(&bs_poses, &samples[index].sample)
            .and_then(|stations| max_distance_all_permutations(&stations));
        solution_errors.extend(report.error_distance);
    }

    let mut verification_errors = Vec::new();
    for (s, report) in samples.iter().zip(reports.iter_mut()) {
        if s.kind != SampleType::Verification || report.status != SampleStatus::Ok {
            continue;
        }
        let Some(stations) = beam_stations(&bs_poses, &s.sample) else {
            report.status = SampleStatus::BsUnknown;
            continue;
        };
        report.pose = position_all_permutations(&stations).map(Pose::from_translation);
        report.error_distance = max_distance_all_permutations(&stations);
        verification_errors.extend(report.error_distance);
    }

    for r in &reports {
        if r.status != SampleStatus::Ok {
            warn!("{} sample at t={:.3}: {}", r.kind, r.timestamp, r.status);
        } else if r.is_error_large() {
            warn!(
                "{} sample at t={:.3}: large error ({:.1} mm)",
                r.kind,
                r.timestamp,
                r.error_distance.unwrap_or_default() * 1000.0
            );
        }
    }

    Ok(EstimationReport {
        geometries: bs_poses
            .iter()
            .map(|(id, p)| (*id, BaseStationGeometry::from(p)))
            .collect(),
        bs_poses,
        samples: reports,
        alignment: alignment.transform,
        scale: scaled.factor,
        converged: solution.converged,
        iterations: solution.iterations,
        final_cost: solution.final_cost,
        summary: solution.summary(),
        error_info: solution.error_info,
        solution_stats: ErrorStats::from_values(&solution_errors),
        verification_stats: ErrorStats::from_values(&verification_errors),
    })
}

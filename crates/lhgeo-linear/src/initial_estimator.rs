//! Coarse, globally consistent poses from per-sample IPPE hypotheses.
//!
//! Every station seen in a sample has two mirror-ambiguous pose hypotheses.
//! For a pair of stations seen together, the true hypotheses give the same
//! relative position in every sample while mirror artifacts scatter, so
//! clustering the relative positions across samples identifies the true
//! combination. Each sample then picks the hypotheses agreeing best with the
//! clustered relative positions, and the stations are chained together
//! through shared samples into the frame of the first sample.

use crate::planar_pose::{augment_sample, AugmentedSample, BsPosePair};
use lhgeo_core::{
    mean_pose, BsId, MatchedSample, Pose, Real, SensorGeometry, SystemPoses, Vec3,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InitialEstimateError {
    #[error("no sample with at least two base stations")]
    NoUsableSamples,
    #[error("base stations {bs_ids:?} cannot be linked to the reference frame")]
    Unreachable { bs_ids: Vec<BsId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialEstimatorConfig {
    /// Acceptance radius when assigning relative positions to cluster seeds.
    pub cluster_radius: Real,
    /// Samples whose best hypothesis combination deviates more than this
    /// from the clustered relative positions are dropped.
    pub outlier_threshold: Real,
}

impl Default for InitialEstimatorConfig {
    fn default() -> Self {
        Self {
            cluster_radius: 0.8,
            outlier_threshold: 0.5,
        }
    }
}

/// Output of [`InitialEstimator::estimate`].
#[derive(Debug, Clone)]
pub struct InitialEstimate {
    /// Station poses and one pose per entry of `samples`; `sample_poses[0]` is identity.
    pub poses: SystemPoses,
    /// Samples that survived outlier rejection, in input order.
    pub samples: Vec<AugmentedSample>,
    /// Index of each entry of `samples` in the input slice.
    pub kept_indices: Vec<usize>,
    /// Selected pose of each visible station in the frame of each kept sample.
    pub local_poses: Vec<BTreeMap<BsId, Pose>>,
}

impl InitialEstimate {
    pub fn matched_samples(&self) -> Vec<MatchedSample> {
        self.samples.iter().map(|s| s.sample.clone()).collect()
    }
}

type PairKey = (BsId, BsId);

/// The four candidate positions of `hi` in the frame of `lo`, one per
/// hypothesis combination `(lo_choice, hi_choice)`.
type Candidates = [Vec3; 4];

#[derive(Debug, Clone, Copy, Default)]
pub struct InitialEstimator {
    pub config: InitialEstimatorConfig,
}

impl InitialEstimator {
    pub fn new(config: InitialEstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimate station and platform poses from matched samples.
    ///
    /// The frame of the first sample that survives outlier rejection becomes
    /// the global frame. Samples with a single station carry no relative
    /// information and are skipped, but their stations must still be
    /// reachable. The same holds for samples whose IPPE solve fails.
    pub fn estimate(
        &self,
        samples: &[MatchedSample],
        sensors: &SensorGeometry,
    ) -> Result<InitialEstimate, InitialEstimateError> {
        let mut must_resolve: BTreeSet<BsId> = BTreeSet::new();
        let mut augmented = Vec::new();
        for (idx, sample) in samples.iter().enumerate() {
            if sample.bs_count() < 2 {
                must_resolve.extend(sample.bs_ids());
                continue;
            }
            match augment_sample(sample, sensors) {
                Ok(aug) => augmented.push((idx, aug)),
                Err(err) => {
                    warn!("sample {idx} dropped: {err}");
                    must_resolve.extend(sample.bs_ids());
                }
            }
        }
        if augmented.is_empty() {
            return Err(InitialEstimateError::NoUsableSamples);
        }

        let pools = permutation_pools(&augmented);
        let accepted: BTreeMap<PairKey, Vec3> = pools
            .iter()
            .map(|(key, pool)| (*key, self.cluster(pool)))
            .collect();

        let mut kept = Vec::new();
        let mut local_poses = Vec::new();
        for (idx, aug) in augmented {
            match self.select_hypotheses(&aug, &accepted) {
                Some(poses) => {
                    kept.push((idx, aug));
                    local_poses.push(poses);
                }
                None => debug!("sample {idx} rejected as outlier"),
            }
        }
        if kept.is_empty() {
            return Err(InitialEstimateError::NoUsableSamples);
        }

        for (_, aug) in &kept {
            must_resolve.extend(aug.bs_ids());
        }
        let in_outliers: BTreeSet<BsId> = pools
            .keys()
            .flat_map(|(a, b)| [*a, *b])
            .filter(|id| !must_resolve.contains(id))
            .collect();
        if !in_outliers.is_empty() {
            warn!("base stations {in_outliers:?} only seen in outlier samples, dropped");
        }

        let bs_poses = propagate(&local_poses, &must_resolve)?;
        let sample_poses = sample_poses(&local_poses, &bs_poses);

        let (kept_indices, samples): (Vec<usize>, Vec<AugmentedSample>) = kept.into_iter().unzip();
        Ok(InitialEstimate {
            poses: SystemPoses {
                bs_poses,
                sample_poses,
            },
            samples,
            kept_indices,
            local_poses,
        })
    }

    /// Mean candidate position of the most populated seed cluster.
    ///
    /// The candidates of the first entry are the seeds. Every candidate of
    /// every entry joins its nearest seed if that lies within the radius.
    fn cluster(&self, pool: &[Candidates]) -> Vec3 {
        let seeds = pool[0];
        let mut sums = [Vec3::zeros(); 4];
        let mut counts = [0usize; 4];
        for candidates in pool {
            for c in candidates {
                let nearest = seeds
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (i, (s - c).norm()))
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                if let Some((i, d)) = nearest {
                    if d <= self.config.cluster_radius {
                        sums[i] += c;
                        counts[i] += 1;
                    }
                }
            }
        }

        // first seed wins ties
        let mut best = 0;
        for i in 1..4 {
            if counts[i] > counts[best] {
                best = i;
            }
        }
        sums[best] / counts[best].max(1) as Real
    }

    /// Pick one hypothesis per station so that the relative positions match
    /// the clustered ones. `None` marks the sample as an outlier.
    fn select_hypotheses(
        &self,
        aug: &AugmentedSample,
        accepted: &BTreeMap<PairKey, Vec3>,
    ) -> Option<BTreeMap<BsId, Pose>> {
        let mut ids = aug.bs_ids();
        let first_id = ids.next()?;
        let others: Vec<BsId> = ids.collect();
        let first = &aug.hypotheses[&first_id];

        let mut best: Option<(Real, BTreeMap<BsId, Pose>)> = None;
        for first_choice in 0..2 {
            let first_pose = first.get(first_choice);
            let mut chosen = BTreeMap::from([(first_id, *first_pose)]);

            for other_id in &others {
                let other = &aug.hypotheses[other_id];
                let target = accepted.get(&(first_id, *other_id))?;
                let (pose, _) = (0..2)
                    .map(|c| {
                        let p = other.get(c);
                        (*p, (first_pose.inverse_compose(p).translation - target).norm())
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1))?;
                chosen.insert(*other_id, pose);
            }

            let worst = worst_pair_error(&chosen, accepted);
            if best.as_ref().map_or(true, |(e, _)| worst < *e) {
                best = Some((worst, chosen));
            }
        }

        let (err, chosen) = best?;
        (err <= self.config.outlier_threshold).then_some(chosen)
    }
}

/// Largest deviation of any co-observed pair in `chosen` from its
/// clustered relative position.
fn worst_pair_error(chosen: &BTreeMap<BsId, Pose>, accepted: &BTreeMap<PairKey, Vec3>) -> Real {
    let entries: Vec<(&BsId, &Pose)> = chosen.iter().collect();
    let mut worst: Real = 0.0;
    for (i, (lo, lo_pose)) in entries.iter().enumerate() {
        for (hi, hi_pose) in &entries[i + 1..] {
            if let Some(target) = accepted.get(&(**lo, **hi)) {
                let err = (lo_pose.inverse_compose(hi_pose).translation - target).norm();
                worst = worst.max(err);
            }
        }
    }
    worst
}

/// Candidate relative positions for every co-observed station pair.
///
/// Keys are `(lo, hi)` with `lo < hi`, which matches the id order of the
/// sample maps, so the first station of a sample is always `lo`.
fn permutation_pools(samples: &[(usize, AugmentedSample)]) -> BTreeMap<PairKey, Vec<Candidates>> {
    let mut pools: BTreeMap<PairKey, Vec<Candidates>> = BTreeMap::new();
    for (_, aug) in samples {
        let entries: Vec<(&BsId, &BsPosePair)> = aug.hypotheses.iter().collect();
        for (i, (lo, lo_pair)) in entries.iter().enumerate() {
            for (hi, hi_pair) in &entries[i + 1..] {
                let mut candidates = [Vec3::zeros(); 4];
                for (k, (a, b)) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().enumerate() {
                    candidates[k] = lo_pair.get(a).inverse_compose(hi_pair.get(b)).translation;
                }
                pools.entry((**lo, **hi)).or_default().push(candidates);
            }
        }
    }
    pools
}

/// Chain station poses into the frame of the first sample.
///
/// The lowest station id of the first sample is the anchor. Each pass
/// resolves every station that shares a sample with an already resolved
/// one, averaging over all such samples.
fn propagate(
    local_poses: &[BTreeMap<BsId, Pose>],
    must_resolve: &BTreeSet<BsId>,
) -> Result<BTreeMap<BsId, Pose>, InitialEstimateError> {
    let mut known: BTreeMap<BsId, Pose> = BTreeMap::new();
    if let Some((anchor, pose)) = local_poses.first().and_then(|s| s.iter().next()) {
        known.insert(*anchor, *pose);
    }

    loop {
        let mut estimates: BTreeMap<BsId, Vec<Pose>> = BTreeMap::new();
        for sample in local_poses {
            let Some(platform) = platform_pose(sample, &known) else {
                continue;
            };
            for (id, local) in sample {
                if !known.contains_key(id) {
                    estimates.entry(*id).or_default().push(platform.compose(local));
                }
            }
        }
        if estimates.is_empty() {
            break;
        }
        for (id, poses) in estimates {
            if let Some(mean) = mean_pose(&poses) {
                debug!("base station {id} resolved from {} sample(s)", poses.len());
                known.insert(id, mean);
            }
        }
    }

    let missing: Vec<BsId> = must_resolve
        .iter()
        .filter(|id| !known.contains_key(id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(InitialEstimateError::Unreachable { bs_ids: missing });
    }
    Ok(known)
}

/// Platform pose implied by the resolved stations visible in a sample.
fn platform_pose(sample: &BTreeMap<BsId, Pose>, known: &BTreeMap<BsId, Pose>) -> Option<Pose> {
    let implied: Vec<Pose> = sample
        .iter()
        .filter_map(|(id, local)| known.get(id).map(|g| g.compose(&local.inverse())))
        .collect();
    mean_pose(&implied)
}

fn sample_poses(local_poses: &[BTreeMap<BsId, Pose>], bs_poses: &BTreeMap<BsId, Pose>) -> Vec<Pose> {
    local_poses
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            if i == 0 {
                Pose::identity()
            } else {
                platform_pose(sample, bs_poses).unwrap_or_default()
            }
        })
        .collect()
}

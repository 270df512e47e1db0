//! Measurement and sample containers shared by every estimation stage.

use crate::{AngleVectorSet, Pose, Real};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Base station identifier. Ids are sparse; never assume they are contiguous.
pub type BsId = u32;

/// One reading event: the bearings from a single base station to all sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: Real,
    pub bs_id: BsId,
    pub angles: AngleVectorSet,
}

impl Measurement {
    pub fn new(timestamp: Real, bs_id: BsId, angles: AngleVectorSet) -> Self {
        Self {
            timestamp,
            bs_id,
            angles,
        }
    }
}

/// Role of a recorded sample in the estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleType {
    /// Defines the origin of the reference frame.
    Origin,
    /// A point on the positive X axis.
    XAxis,
    /// A point in the XY plane.
    XyPlane,
    /// Free samples recorded while moving the platform around.
    XyzSpace,
    /// Samples used only to check the result.
    Verification,
}

impl SampleType {
    /// Reference samples may not be silently dropped.
    pub fn is_mandatory(self) -> bool {
        matches!(self, Self::Origin | Self::XAxis | Self::XyPlane)
    }

    /// Stationary recordings are merged into a single sample.
    pub fn is_stationary(self) -> bool {
        !matches!(self, Self::XyzSpace)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Origin => "origin",
            Self::XAxis => "x-axis",
            Self::XyPlane => "xy-plane",
            Self::XyzSpace => "xyz-space",
            Self::Verification => "verification",
        };
        f.write_str(s)
    }
}

/// Bearings seen from one (approximately stationary) platform position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchedSample {
    /// Timestamp of the first measurement merged into the sample.
    pub timestamp: Real,
    pub angles: BTreeMap<BsId, AngleVectorSet>,
}

impl MatchedSample {
    pub fn new(timestamp: Real) -> Self {
        Self {
            timestamp,
            angles: BTreeMap::new(),
        }
    }

    pub fn with_angles(timestamp: Real, angles: BTreeMap<BsId, AngleVectorSet>) -> Self {
        Self { timestamp, angles }
    }

    /// Merge a measurement; a repeated station overwrites the earlier reading.
    pub fn insert(&mut self, bs_id: BsId, angles: AngleVectorSet) {
        self.angles.insert(bs_id, angles);
    }

    pub fn bs_count(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn bs_ids(&self) -> impl Iterator<Item = BsId> + '_ {
        self.angles.keys().copied()
    }
}

/// Poses of all base stations and platform samples in one frame.
///
/// `sample_poses[i]` belongs to the i-th sample of the set the poses were
/// estimated from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemPoses {
    pub bs_poses: BTreeMap<BsId, Pose>,
    pub sample_poses: Vec<Pose>,
}

impl SystemPoses {
    /// Apply `transform` on the left of every pose.
    pub fn transformed(&self, transform: &Pose) -> SystemPoses {
        SystemPoses {
            bs_poses: self
                .bs_poses
                .iter()
                .map(|(id, p)| (*id, transform.compose(p)))
                .collect(),
            sample_poses: self
                .sample_poses
                .iter()
                .map(|p| transform.compose(p))
                .collect(),
        }
    }

    /// Scale every translation by `factor`.
    pub fn scaled(&self, factor: Real) -> SystemPoses {
        SystemPoses {
            bs_poses: self
                .bs_poses
                .iter()
                .map(|(id, p)| (*id, p.scaled(factor)))
                .collect(),
            sample_poses: self.sample_poses.iter().map(|p| p.scaled(factor)).collect(),
        }
    }
}

/// Bidirectional mapping between sparse base station ids and dense indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BsIndexMap {
    ids: Vec<BsId>,
    index: BTreeMap<BsId, usize>,
}

impl BsIndexMap {
    /// Build from any id sequence. Duplicates are ignored and indices follow id order.
    pub fn new(ids: impl IntoIterator<Item = BsId>) -> Self {
        let index: BTreeMap<BsId, usize> = ids.into_iter().map(|id| (id, 0)).collect();
        let ids: Vec<BsId> = index.keys().copied().collect();
        let index = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self { ids, index }
    }

    /// Collect every station seen in `samples`.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a MatchedSample>) -> Self {
        Self::new(samples.into_iter().flat_map(|s| s.bs_ids()))
    }

    pub fn index_of(&self, id: BsId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<BsId> {
        self.ids.get(index).copied()
    }

    pub fn ids(&self) -> &[BsId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_map_handles_gaps() {
        let map = BsIndexMap::new([7, 2, 9, 2, 3]);
        assert_eq!(map.ids(), &[2, 3, 7, 9]);
        assert_eq!(map.index_of(7), Some(2));
        assert_eq!(map.id_at(3), Some(9));
        assert_eq!(map.index_of(4), None);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn insert_overwrites() {
        let mut s = MatchedSample::new(1.0);
        let a = AngleVectorSet::default();
        let mut b = AngleVectorSet::default();
        b.0[0].horiz = 0.5;
        s.insert(4, a);
        s.insert(4, b);
        assert_eq!(s.bs_count(), 1);
        assert_eq!(s.angles[&4], b);
    }

    #[test]
    fn mandatory_types() {
        assert!(SampleType::Origin.is_mandatory());
        assert!(SampleType::XyPlane.is_mandatory());
        assert!(!SampleType::Verification.is_mandatory());
        assert!(!SampleType::XyzSpace.is_stationary());
        assert_eq!(SampleType::XAxis.to_string(), "x-axis");
    }

    #[test]
    fn sample_type_serde_names() {
        let json = serde_json::to_string(&SampleType::XyPlane).unwrap();
        assert_eq!(json, "\"xy-plane\"");
    }
}

//! Sweep-angle residual factor for the bundle adjustment.

use lhgeo_core::{rotate_by_rot_vec, Real, Vec3};
use nalgebra::{convert, DVector, RealField, SVector, Vector3};
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tiny_solver::factors::Factor;

/// Rotation vector followed by translation.
pub(crate) const POSE_DIM: usize = 6;
/// Two sweep angles for each of the four deck sensors.
pub(crate) const SWEEP_RESIDUALS: usize = 8;

fn split_pose<T: RealField>(p: &[T]) -> (Vector3<T>, Vector3<T>) {
    debug_assert_eq!(p.len(), POSE_DIM, "pose must have 6 params");
    (
        Vector3::new(p[0].clone(), p[1].clone(), p[2].clone()),
        Vector3::new(p[3].clone(), p[4].clone(), p[5].clone()),
    )
}

/// Residuals of one station observing one sample.
///
/// `bs` and `platform` are rotation vector plus translation in the global
/// frame. Each residual is `tan(predicted - measured) * |t_bs - t_platform|`.
pub(crate) fn sweep_residuals_generic<T: RealField>(
    bs: &[T],
    platform: &[T],
    sensors: &[Vec3; 4],
    measured: &[Real; SWEEP_RESIDUALS],
) -> SVector<T, SWEEP_RESIDUALS> {
    let (bs_rv, bs_t) = split_pose(bs);
    let (cf_rv, cf_t) = split_pose(platform);
    let distance = (&bs_t - &cf_t).norm();
    let to_local = -bs_rv;

    let mut r = SVector::<T, SWEEP_RESIDUALS>::zeros();
    for (i, sensor) in sensors.iter().enumerate() {
        let sensor: Vector3<T> = sensor.map(convert::<Real, T>);
        let global = rotate_by_rot_vec(&cf_rv, &sensor) + &cf_t;
        let local = rotate_by_rot_vec(&to_local, &(global - &bs_t));
        let horiz = local.y.clone().atan2(local.x.clone());
        let vert = local.z.clone().atan2(local.x.clone());
        r[2 * i] = (horiz - convert::<Real, T>(measured[2 * i])).tan() * distance.clone();
        r[2 * i + 1] = (vert - convert::<Real, T>(measured[2 * i + 1])).tan() * distance.clone();
    }
    r
}

/// One (sample, station) block over the `[bs, sample]` parameter blocks.
#[derive(Debug, Clone)]
pub(crate) struct SweepFactor {
    pub sensors: [Vec3; 4],
    pub measured: [Real; SWEEP_RESIDUALS],
    /// Bumped on every linearization, that is every evaluation with dual numbers.
    pub linearizations: Option<Arc<AtomicUsize>>,
}

impl<T: RealField + 'static> Factor<T> for SweepFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 2, "expected [bs, sample] parameter blocks");
        if let Some(count) = &self.linearizations {
            if TypeId::of::<T>() != TypeId::of::<Real>() {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
        let r = sweep_residuals_generic(
            params[0].as_slice(),
            params[1].as_slice(),
            &self.sensors,
            &self.measured,
        );
        DVector::from_column_slice(r.as_slice())
    }
}

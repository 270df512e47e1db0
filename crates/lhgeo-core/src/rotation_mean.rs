//! Averaging of rotations and poses.

use crate::{Pose, Quat, Vec3};
use nalgebra::{Matrix4, Quaternion, SymmetricEigen};

/// Least-squares mean of a set of rotations.
///
/// Returns the eigenvector of the largest eigenvalue of `Σ q qᵀ` over the
/// unit quaternions `q`. The outer product is invariant to the sign of `q`,
/// so `q` and `-q` (the same rotation) contribute identically. Returns `None`
/// for an empty input.
pub fn mean_rotation<'a>(rotations: impl IntoIterator<Item = &'a Quat>) -> Option<Quat> {
    let mut acc = Matrix4::zeros();
    let mut count = 0usize;
    for q in rotations {
        let c = q.coords;
        acc += c * c.transpose();
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let eig = SymmetricEigen::new(acc);
    let (best, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let v = eig.eigenvectors.column(best);
    // `coords` order is (i, j, k, w)
    let q = Quaternion::new(v[3], v[0], v[1], v[2]);
    Some(Quat::new_normalize(q))
}

/// Mean of a set of poses: arithmetic mean translation and [`mean_rotation`].
pub fn mean_pose<'a>(poses: impl IntoIterator<Item = &'a Pose>) -> Option<Pose> {
    let poses: Vec<&Pose> = poses.into_iter().collect();
    if poses.is_empty() {
        return None;
    }
    let translation =
        poses.iter().map(|p| p.translation).sum::<Vec3>() / poses.len() as f64;
    let rotation = mean_rotation(poses.iter().map(|p| &p.rotation))?;
    Some(Pose::from_quaternion(rotation, translation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_mean() {
        assert!(mean_rotation(std::iter::empty()).is_none());
        assert!(mean_pose(std::iter::empty()).is_none());
    }

    #[test]
    fn single_rotation_is_its_own_mean() {
        let q = Quat::from_scaled_axis(Vec3::new(0.2, -0.5, 1.0));
        let m = mean_rotation([&q]).unwrap();
        assert!(m.angle_to(&q) < 1e-9);
    }

    #[test]
    fn symmetric_spread_averages_to_center() {
        let center = Quat::from_scaled_axis(Vec3::new(0.0, 0.0, 0.8));
        let a = center * Quat::from_scaled_axis(Vec3::new(0.1, 0.0, 0.0));
        let b = center * Quat::from_scaled_axis(Vec3::new(-0.1, 0.0, 0.0));
        let m = mean_rotation([&a, &b]).unwrap();
        assert!(m.angle_to(&center) < 1e-9);
    }

    #[test]
    fn sign_flipped_quaternions_agree() {
        let q = Quat::from_scaled_axis(Vec3::new(0.3, 0.3, -0.2));
        let neg = Quat::new_unchecked(-q.into_inner());
        let m = mean_rotation([&q, &neg, &q]).unwrap();
        assert!(m.angle_to(&q) < 1e-9);
    }

    #[test]
    fn mean_pose_averages_translation() {
        let a = Pose::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let b = Pose::from_translation(Vec3::new(3.0, 2.0, 0.0));
        let m = mean_pose([&a, &b]).unwrap();
        assert!((m.translation - Vec3::new(2.0, 1.0, 0.0)).norm() < 1e-12);
        assert!(m.rotation.angle() < 1e-9);
    }
}

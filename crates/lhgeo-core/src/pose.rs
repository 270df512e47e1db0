//! Rigid transform used for both base stations and platform samples.
//!
//! A [`Pose`] maps points from its local frame into the parent frame:
//! `p_parent = R * p_local + t`. Rotation is stored as a unit quaternion so
//! composition keeps the rotation orthonormal with `det = +1`.

use crate::{Mat3, Quat, Real, Vec3};
use nalgebra::{Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            rotation: Quat::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Build from a rotation matrix. The matrix must be orthonormal.
    pub fn from_rotation_matrix(rotation: &Mat3, translation: Vec3) -> Self {
        let rot = Rotation3::from_matrix_unchecked(*rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot),
            translation,
        }
    }

    /// Build from an axis-angle rotation vector.
    pub fn from_rot_vec(rot_vec: Vec3, translation: Vec3) -> Self {
        Self {
            rotation: Quat::from_scaled_axis(rot_vec),
            translation,
        }
    }

    pub fn from_quaternion(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from roll, pitch and yaw (radians), applied as `Rz(yaw) * Ry(pitch) * Rx(roll)`.
    pub fn from_rpy(roll: Real, pitch: Real, yaw: Real, translation: Vec3) -> Self {
        Self {
            rotation: Quat::from_euler_angles(roll, pitch, yaw),
            translation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::identity(),
            translation,
        }
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn rot_vec(&self) -> Vec3 {
        self.rotation.scaled_axis()
    }

    /// Local to parent: `R * p + t`.
    pub fn rotate_translate(&self, point: &Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Parent to local: `R^T * (p - t)`.
    pub fn inverse_rotate_translate(&self, point: &Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(point - self.translation))
    }

    /// Express `other`, given in this pose's frame, in the parent frame.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Express `other`, given in the parent frame, relative to this pose.
    ///
    /// Inverse of [`Pose::compose`]: `a.inverse_compose(&a.compose(&b)) == b`.
    pub fn inverse_compose(&self, other: &Pose) -> Pose {
        let inv = self.rotation.inverse();
        Pose {
            rotation: inv * other.rotation,
            translation: inv * (other.translation - self.translation),
        }
    }

    pub fn inverse(&self) -> Pose {
        let inv = self.rotation.inverse();
        Pose {
            rotation: inv,
            translation: -(inv * self.translation),
        }
    }

    /// Multiply the translation by `factor` in place. Rotation is untouched.
    pub fn scale(&mut self, factor: Real) {
        self.translation *= factor;
    }

    pub fn scaled(&self, factor: Real) -> Pose {
        Pose {
            rotation: self.rotation,
            translation: self.translation * factor,
        }
    }

    /// Geodesic angle between the rotations of `self` and `other`.
    pub fn angle_to(&self, other: &Pose) -> Real {
        self.rotation.angle_to(&other.rotation)
    }

    /// Translation distance between `self` and `other`.
    pub fn distance_to(&self, other: &Pose) -> Real {
        (self.translation - other.translation).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn sample_poses() -> (Pose, Pose) {
        (
            Pose::from_rot_vec(Vec3::new(0.1, -0.4, 1.2), Vec3::new(1.0, 2.0, 3.0)),
            Pose::from_rot_vec(Vec3::new(-0.7, 0.2, 0.05), Vec3::new(-0.5, 0.25, 2.0)),
        )
    }

    #[test]
    fn compose_round_trip() {
        let (a, b) = sample_poses();
        let back = a.inverse_compose(&a.compose(&b));
        assert!(back.distance_to(&b) < 1e-12);
        assert!(back.angle_to(&b) < 1e-12);
    }

    #[test]
    fn point_round_trip() {
        let (a, _) = sample_poses();
        let p = Vec3::new(0.3, -1.0, 4.0);
        let back = a.inverse_rotate_translate(&a.rotate_translate(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn inverse_matches_inverse_compose_with_identity() {
        let (a, _) = sample_poses();
        let inv = a.inverse();
        let expected = a.inverse_compose(&Pose::identity());
        assert!(inv.distance_to(&expected) < 1e-12);
        assert!(a.compose(&inv).angle_to(&Pose::identity()) < 1e-12);
    }

    #[test]
    fn rotation_representations_round_trip() {
        let (a, _) = sample_poses();
        let from_m = Pose::from_rotation_matrix(&a.rotation_matrix(), a.translation);
        let from_v = Pose::from_rot_vec(a.rot_vec(), a.translation);
        let from_q = Pose::from_quaternion(a.rotation, a.translation);
        for p in [from_m, from_v, from_q] {
            assert!(p.angle_to(&a) < 1e-12);
            assert!((p.rotation_matrix().determinant() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rpy_yaw_only() {
        let p = Pose::from_rpy(0.0, 0.0, FRAC_PI_2, Vec3::zeros());
        let v = p.rotate_translate(&Vec3::x());
        assert!((v - Vec3::y()).norm() < 1e-12);
    }

    #[test]
    fn rot_vec_of_half_turn() {
        let p = Pose::from_rot_vec(Vec3::new(0.0, 0.0, PI), Vec3::zeros());
        assert!((p.rot_vec().norm() - PI).abs() < 1e-12);
    }

    #[test]
    fn scale_only_touches_translation() {
        let (mut a, _) = sample_poses();
        let rot = a.rotation;
        a.scale(2.0);
        assert_eq!(a.translation, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.rotation, rot);
        assert_eq!(a.scaled(0.5).translation, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn serde_round_trip() {
        let (a, _) = sample_poses();
        let json = serde_json::to_string(&a).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert!(back.distance_to(&a) < 1e-12);
    }
}

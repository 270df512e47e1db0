use nalgebra::{convert, Matrix3, Point2, Point3, RealField, UnitQuaternion, Vector2, Vector3};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Quat = UnitQuaternion<Real>;

/// Rotate `p` by the rotation vector `rot_vec` using Rodrigues' formula.
///
/// Works directly on the axis-angle vector, so it can be evaluated on raw
/// optimizer parameters without building a matrix or quaternion first.
/// Generic over the scalar so that dual numbers pass through it.
pub fn rotate_by_rot_vec<T: RealField>(rot_vec: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta_sq = rot_vec.norm_squared();
    let cross = rot_vec.cross(p);
    if theta_sq < convert::<Real, T>(1e-24) {
        // second-order expansion around identity
        return p + rot_vec.cross(&cross) * convert::<Real, T>(0.5) + cross;
    }
    let theta = theta_sq.clone().sqrt();
    let (s, c) = theta.clone().sin_cos();
    let along = rot_vec.dot(p) * ((T::one() - c.clone()) / theta_sq);
    p * c + cross * (s / theta) + rot_vec * along
}

/// Rotation matrix for a rotation of `angle` radians about the Z axis.
pub fn rot_z(angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Rotation matrix for a rotation of `angle` radians about the X axis.
pub fn rot_x(angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

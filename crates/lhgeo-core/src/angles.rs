//! Bearings from a base station towards a sensor.
//!
//! An [`AngleVector`] is expressed in the base station frame: X points
//! straight out of the emitter, Y to the left and Z up. The horizontal angle
//! is positive to the left, the vertical angle positive upwards.

use crate::{Real, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Tilt of the two light planes of a dual-sweep emitter, radians.
pub const SWEEP_PLANE_TILT: Real = std::f64::consts::FRAC_PI_6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngleVector {
    pub horiz: Real,
    pub vert: Real,
}

impl AngleVector {
    pub fn new(horiz: Real, vert: Real) -> Self {
        Self { horiz, vert }
    }

    /// Convert the two sweep angles of a tilted dual-plane emitter into a
    /// horizontal/vertical bearing.
    pub fn from_two_sweep_angles(a1: Real, a2: Real) -> Self {
        let horiz = (a1 + a2) / 2.0;
        let vert = (a2 - a1)
            .sin()
            .atan2(SWEEP_PLANE_TILT.tan() * (a1.cos() + a2.cos()));
        Self { horiz, vert }
    }

    /// Bearing towards a point given in the base station frame.
    pub fn from_cart(v: &Vec3) -> Self {
        Self {
            horiz: v.y.atan2(v.x),
            vert: v.z.atan2(v.x),
        }
    }

    /// Bearing through a point on the plane one unit in front of the emitter.
    pub fn from_projection(p: &Vec2) -> Self {
        Self {
            horiz: p.x.atan(),
            vert: p.y.atan(),
        }
    }

    /// First sweep angle, inverse of [`AngleVector::from_two_sweep_angles`].
    pub fn sweep1(&self) -> Real {
        self.horiz + (self.q() * (-SWEEP_PLANE_TILT).tan()).asin()
    }

    /// Second sweep angle, inverse of [`AngleVector::from_two_sweep_angles`].
    pub fn sweep2(&self) -> Real {
        self.horiz + (self.q() * SWEEP_PLANE_TILT.tan()).asin()
    }

    pub fn sweep_angles(&self) -> (Real, Real) {
        (self.sweep1(), self.sweep2())
    }

    /// Unit direction in the base station frame.
    ///
    /// Infinite when `horiz` or `vert` is `±π/2`; callers must keep bearings
    /// inside the forward half space.
    pub fn cart(&self) -> Vec3 {
        Vec3::new(1.0, self.horiz.tan(), self.vert.tan()).normalize()
    }

    /// Intersection of the ray with the plane `x = 1`, as `(y, z)`.
    pub fn projection(&self) -> Vec2 {
        Vec2::new(self.horiz.tan(), self.vert.tan())
    }

    fn q(&self) -> Real {
        let th = self.horiz.tan();
        self.vert.tan() / (1.0 + th * th).sqrt()
    }
}

/// Bearings to the four sensors of the platform, in sensor index order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngleVectorSet(pub [AngleVector; 4]);

impl AngleVectorSet {
    pub fn new(vectors: [AngleVector; 4]) -> Self {
        Self(vectors)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AngleVector> {
        self.0.iter()
    }

    pub fn projections(&self) -> [Vec2; 4] {
        self.0.map(|v| v.projection())
    }

    /// All eight angles, sensor by sensor, horizontal first.
    pub fn angle_list(&self) -> [Real; 8] {
        let mut out = [0.0; 8];
        for (i, v) in self.0.iter().enumerate() {
            out[2 * i] = v.horiz;
            out[2 * i + 1] = v.vert;
        }
        out
    }
}

impl std::ops::Index<usize> for AngleVectorSet {
    type Output = AngleVector;

    fn index(&self, index: usize) -> &AngleVector {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Real, b: Real) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sweep_angles_round_trip() {
        for (h, v) in [(0.0, 0.0), (0.3, -0.2), (-0.7, 0.45), (1.0, 0.1)] {
            let av = AngleVector::new(h, v);
            let back = AngleVector::from_two_sweep_angles(av.sweep1(), av.sweep2());
            assert!(close(back.horiz, h), "horiz {} vs {}", back.horiz, h);
            assert!(close(back.vert, v), "vert {} vs {}", back.vert, v);
        }
    }

    #[test]
    fn zero_sweeps_look_straight_ahead() {
        let av = AngleVector::from_two_sweep_angles(0.0, 0.0);
        assert!(close(av.horiz, 0.0));
        assert!(close(av.vert, 0.0));
        assert!((av.cart() - Vec3::x()).norm() < 1e-12);
    }

    #[test]
    fn cart_is_unit_norm() {
        for (h, v) in [(0.0, 0.0), (0.3, -0.2), (-1.2, 1.3), (0.01, -0.9)] {
            let c = AngleVector::new(h, v).cart();
            assert!(close(c.norm(), 1.0));
        }
    }

    #[test]
    fn cart_round_trip() {
        let p = Vec3::new(2.0, -0.5, 0.75);
        let av = AngleVector::from_cart(&p);
        let c = av.cart();
        assert!((c - p.normalize()).norm() < 1e-12);
    }

    #[test]
    fn projection_round_trip() {
        let av = AngleVector::new(0.25, -0.4);
        let back = AngleVector::from_projection(&av.projection());
        assert!(close(back.horiz, av.horiz));
        assert!(close(back.vert, av.vert));
    }

    #[test]
    fn left_and_up_are_positive() {
        let av = AngleVector::from_cart(&Vec3::new(1.0, 1.0, 1.0));
        assert!(av.horiz > 0.0);
        assert!(av.vert > 0.0);
    }

    #[test]
    fn angle_list_order() {
        let set = AngleVectorSet::new([
            AngleVector::new(1.0, 2.0),
            AngleVector::new(3.0, 4.0),
            AngleVector::new(5.0, 6.0),
            AngleVector::new(7.0, 8.0),
        ]);
        assert_eq!(set.angle_list(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(set[2].horiz, 5.0);
    }
}

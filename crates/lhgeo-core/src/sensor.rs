use crate::{Real, Vec3};
use serde::{Deserialize, Serialize};

/// Positions of the four photosensors in the platform frame, in sensor index order.
///
/// Passed explicitly to everything that projects or solves, so synthetic
/// layouts can be used in tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorGeometry {
    pub positions: [Vec3; 4],
}

impl SensorGeometry {
    /// Sensor distance along the Y axis of the Lighthouse deck, meters.
    pub const DECK_WIDTH: Real = 0.015;
    /// Sensor distance along the X axis of the Lighthouse deck, meters.
    pub const DECK_LENGTH: Real = 0.030;

    pub fn new(positions: [Vec3; 4]) -> Self {
        Self { positions }
    }

    /// Rectangular layout centered on the origin in the z = 0 plane.
    pub fn rectangle(length: Real, width: Real) -> Self {
        let l = length / 2.0;
        let w = width / 2.0;
        Self::new([
            Vec3::new(-l, w, 0.0),
            Vec3::new(-l, -w, 0.0),
            Vec3::new(l, w, 0.0),
            Vec3::new(l, -w, 0.0),
        ])
    }

    /// Lighthouse deck layout.
    pub fn deck() -> Self {
        Self::rectangle(Self::DECK_LENGTH, Self::DECK_WIDTH)
    }

    /// Mean length of the two diagonals, sensor 0-3 and sensor 1-2.
    pub fn diagonal_distance(&self) -> Real {
        let d1 = (self.positions[0] - self.positions[3]).norm();
        let d2 = (self.positions[1] - self.positions[2]).norm();
        (d1 + d2) / 2.0
    }
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self::deck()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_diagonal() {
        let g = SensorGeometry::deck();
        let expected = (0.015_f64.powi(2) + 0.03_f64.powi(2)).sqrt();
        assert!((g.diagonal_distance() - expected).abs() < 1e-12);
    }

    #[test]
    fn deck_is_planar_and_centered() {
        let g = SensorGeometry::default();
        let c: Vec3 = g.positions.iter().sum::<Vec3>() / 4.0;
        assert!(c.norm() < 1e-12);
        assert!(g.positions.iter().all(|p| p.z == 0.0));
    }
}

//! Closest approach of two bearings from different base stations.
//!
//! In a perfect system the bearings of two stations to the same sensor
//! intersect at the sensor. In practice they pass each other; the midpoint of
//! the shortest connecting segment is used as the position estimate and the
//! segment length as an error measure.

use crate::{AngleVector, AngleVectorSet, Pose, Real, Vec3};

/// Midpoint and length of the shortest segment between two bearings.
pub fn position_distance(
    bs1: &Pose,
    angles1: &AngleVector,
    bs2: &Pose,
    angles2: &AngleVector,
) -> (Vec3, Real) {
    let dir1 = bs1.rotation * angles1.cart();
    let dir2 = bs2.rotation * angles2.cart();
    closest_approach(&bs1.translation, &dir1, &bs2.translation, &dir2)
}

pub fn position(bs1: &Pose, angles1: &AngleVector, bs2: &Pose, angles2: &AngleVector) -> Vec3 {
    position_distance(bs1, angles1, bs2, angles2).0
}

pub fn distance(bs1: &Pose, angles1: &AngleVector, bs2: &Pose, angles2: &AngleVector) -> Real {
    position_distance(bs1, angles1, bs2, angles2).1
}

/// Largest beam distance over the four sensors.
pub fn max_distance(
    bs1: &Pose,
    angles1: &AngleVectorSet,
    bs2: &Pose,
    angles2: &AngleVectorSet,
) -> Real {
    angles1
        .iter()
        .zip(angles2.iter())
        .map(|(a1, a2)| distance(bs1, a1, bs2, a2))
        .fold(0.0, Real::max)
}

/// Largest beam distance over every station pair and sensor.
///
/// Returns `None` with fewer than two stations.
pub fn max_distance_all_permutations(stations: &[(Pose, AngleVectorSet)]) -> Option<Real> {
    if stations.len() < 2 {
        return None;
    }
    let mut max = 0.0;
    for (i, (p1, a1)) in stations.iter().enumerate() {
        for (p2, a2) in &stations[i + 1..] {
            max = Real::max(max, max_distance(p1, a1, p2, a2));
        }
    }
    Some(max)
}

/// Platform position estimate: mean crossing point over all station pairs and sensors.
///
/// Returns `None` with fewer than two stations.
pub fn position_all_permutations(stations: &[(Pose, AngleVectorSet)]) -> Option<Vec3> {
    let mut sum = Vec3::zeros();
    let mut count = 0usize;
    for (i, (p1, a1)) in stations.iter().enumerate() {
        for (p2, a2) in &stations[i + 1..] {
            for (s1, s2) in a1.iter().zip(a2.iter()) {
                sum += position(p1, s1, p2, s2);
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as Real)
}

fn closest_approach(orig1: &Vec3, dir1: &Vec3, orig2: &Vec3, dir2: &Vec3) -> (Vec3, Real) {
    let w0 = orig1 - orig2;
    let a = dir1.dot(dir1);
    let b = dir1.dot(dir2);
    let c = dir2.dot(dir2);
    let d = dir1.dot(&w0);
    let e = dir2.dot(&w0);

    let denom = a * c - b * b;
    let (t1, t2) = if denom.abs() <= Real::EPSILON * a * c {
        // parallel beams: project the first origin onto the second beam
        (0.0, e / c)
    } else {
        ((b * e - c * d) / denom, (a * e - b * d) / denom)
    };

    let pt1 = orig1 + dir1 * t1;
    let pt2 = orig2 + dir2 * t2;
    ((pt1 + pt2) / 2.0, (pt1 - pt2).norm())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_at(bs: &Pose, target: &Vec3) -> AngleVector {
        AngleVector::from_cart(&bs.inverse_rotate_translate(target))
    }

    #[test]
    fn intersecting_beams() {
        let bs1 = Pose::from_translation(Vec3::new(-1.0, 0.0, 1.0));
        let bs2 = Pose::from_rot_vec(
            Vec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vec3::new(0.0, -1.0, 1.0),
        );
        let target = Vec3::new(0.2, 0.1, 0.3);
        let (pos, dist) =
            position_distance(&bs1, &looking_at(&bs1, &target), &bs2, &looking_at(&bs2, &target));
        assert!((pos - target).norm() < 1e-9);
        assert!(dist < 1e-9);
    }

    #[test]
    fn skew_beams() {
        // beam 1 along X at z = 0, beam 2 along Y at z = 1
        let bs1 = Pose::from_translation(Vec3::new(-5.0, 0.0, 0.0));
        let bs2 = Pose::from_rot_vec(
            Vec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vec3::new(0.0, -5.0, 1.0),
        );
        let straight = AngleVector::new(0.0, 0.0);
        let (pos, dist) = position_distance(&bs1, &straight, &bs2, &straight);
        assert!((dist - 1.0).abs() < 1e-9);
        assert!((pos - Vec3::new(0.0, 0.0, 0.5)).norm() < 1e-9);
    }

    #[test]
    fn parallel_beams_are_finite() {
        let bs1 = Pose::from_translation(Vec3::new(0.0, 0.0, 0.0));
        let bs2 = Pose::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let straight = AngleVector::new(0.0, 0.0);
        let d = distance(&bs1, &straight, &bs2, &straight);
        assert!((d - 2.0).abs() < 1e-9);
    }

    #[test]
    fn needs_two_stations() {
        let one = [(Pose::identity(), AngleVectorSet::default())];
        assert!(max_distance_all_permutations(&one).is_none());
        assert!(position_all_permutations(&one).is_none());
    }
}

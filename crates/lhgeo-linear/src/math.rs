//! Numerical conditioning helpers shared by the closed-form solvers.
//!
//! # Hartley Normalization
//!
//! DLT-style estimation is badly conditioned when point coordinates are far
//! from unit magnitude. Centering the points and scaling them to a mean
//! distance of `√2` before assembling the constraint matrix fixes this.

use lhgeo_core::{Mat3, Pt2, Real};

/// Hartley normalization for 2D points.
///
/// # Arguments
///
/// * `points` - Slice of 2D points to normalize
///
/// # Returns
///
/// * `Some((normalized_points, transform_matrix))` - Normalized points and
///   the 3x3 transformation `T` such that `p_norm = T * p_homogeneous`
/// * `None` - If input is empty or all points coincide (zero mean distance)
///
/// # Algorithm
///
/// 1. Compute centroid `(cx, cy)` of all points
/// 2. Compute mean Euclidean distance from centroid
/// 3. Scale factor = `√2 / mean_distance`
/// 4. Transformation matrix: translate to origin, then scale
///
/// # References
///
/// Hartley & Zisserman, "Multiple View Geometry in Computer Vision", 2nd ed.,
/// Algorithm 4.2 (Normalized DLT)
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<Real>()
        / n;

    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = Real::sqrt(2.0) / mean_dist;
    #[rustfmt::skip]
    let t = Mat3::new(
        scale, 0.0, -scale * cx,
        0.0, scale, -scale * cy,
        0.0, 0.0, 1.0,
    );

    let norm = points
        .iter()
        .map(|p| Pt2::new((p.x - cx) * scale, (p.y - cy) * scale))
        .collect();

    Some((norm, t))
}

/// Apply a 3x3 projective transform to a 2D point.
pub fn transform_point_2d(h: &Mat3, p: &Pt2) -> Pt2 {
    let v = h * p.to_homogeneous();
    Pt2::new(v.x / v.z, v.y / v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_2d_centering() {
        let points = vec![
            Pt2::new(100.0, 200.0),
            Pt2::new(200.0, 300.0),
            Pt2::new(150.0, 250.0),
        ];

        let (norm, t) = normalize_points_2d(&points).unwrap();

        let cx: Real = norm.iter().map(|p| p.x).sum::<Real>() / norm.len() as Real;
        let cy: Real = norm.iter().map(|p| p.y).sum::<Real>() / norm.len() as Real;
        assert!(cx.abs() < 1e-10, "Centroid x not at origin: {}", cx);
        assert!(cy.abs() < 1e-10, "Centroid y not at origin: {}", cy);

        let mean_dist: Real = norm
            .iter()
            .map(|p| (p.x * p.x + p.y * p.y).sqrt())
            .sum::<Real>()
            / norm.len() as Real;
        assert!(
            (mean_dist - Real::sqrt(2.0)).abs() < 1e-10,
            "Mean distance not sqrt(2): {}",
            mean_dist
        );

        let mapped = transform_point_2d(&t, &points[0]);
        assert!((mapped - norm[0]).norm() < 1e-12);
    }

    #[test]
    fn coincident_points_rejected() {
        let points = vec![Pt2::new(1.0, 1.0); 4];
        assert!(normalize_points_2d(&points).is_none());
        assert!(normalize_points_2d(&[]).is_none());
    }
}

//! Infinitesimal Plane-based Pose Estimation.
//!
//! Closed-form pose of a planar point set seen by a calibrated pinhole
//! observer. A single planar view is ambiguous: two rotations explain the
//! same projected shape, so the solver always returns both.
//!
//! Camera convention: points in the camera frame are projected as
//! `q = (X / Z, Y / Z)`.
//!
//! # References
//!
//! T. Collins and A. Bartoli, "Infinitesimal Plane-Based Pose Estimation",
//! IJCV 2014.

use crate::homography::{dlt_homography, HomographyError};
use lhgeo_core::{Mat3, Pose, Pt2, Real, Vec2, Vec3};
use nalgebra::{Matrix2, Matrix3x2, SymmetricEigen};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IppeError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point counts differ: {model} model vs {image} image")]
    MismatchedPoints { model: usize, image: usize },
    #[error("homography estimation failed: {0}")]
    Homography(#[from] HomographyError),
    #[error("degenerate geometry: {0}")]
    Degenerate(&'static str),
}

/// One pose hypothesis: model frame to camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IppeSolution {
    pub rotation: Mat3,
    pub translation: Vec3,
    /// Euclidean norm of all stacked 2D reprojection residuals.
    pub reproj_error: Real,
}

impl IppeSolution {
    pub fn pose(&self) -> Pose {
        Pose::from_rotation_matrix(&self.rotation, self.translation)
    }
}

/// Solve for the two poses of a planar model.
///
/// `model` must be coplanar (any plane, any origin) and `image` holds the
/// matching normalized projections. The first returned solution has the
/// smaller reprojection error.
///
/// A fronto-parallel view yields two coinciding solutions. Inputs that make
/// the closed form non-finite are reported as [`IppeError::Degenerate`].
pub fn solve_ippe(model: &[Vec3], image: &[Vec2]) -> Result<[IppeSolution; 2], IppeError> {
    let n = model.len();
    if image.len() != n {
        return Err(IppeError::MismatchedPoints {
            model: n,
            image: image.len(),
        });
    }
    if n < 4 {
        return Err(IppeError::NotEnoughPoints(n));
    }

    let (centroid, plane_rot) = fit_model_plane(model);
    let plane_pts: Vec<Pt2> = model
        .iter()
        .map(|p| {
            let q = plane_rot * (p - centroid);
            Pt2::new(q.x, q.y)
        })
        .collect();
    let image_pts: Vec<Pt2> = image.iter().map(|q| Pt2::new(q.x, q.y)).collect();

    let h = dlt_homography(&plane_pts, &image_pts)?;

    // Jacobian of the homography at the model origin
    let j = Matrix2::new(
        h[(0, 0)] - h[(2, 0)] * h[(0, 2)],
        h[(0, 1)] - h[(2, 1)] * h[(0, 2)],
        h[(1, 0)] - h[(2, 0)] * h[(1, 2)],
        h[(1, 1)] - h[(2, 1)] * h[(1, 2)],
    );
    let v = Vec2::new(h[(0, 2)], h[(1, 2)]);

    let (r1, r2) = decompose_jacobian(&v, &j)?;

    let mut solutions = [r1, r2].map(|r_plane| {
        let t_plane = estimate_translation(&r_plane, &plane_pts, image);
        // back to the caller's model frame
        let rotation = r_plane * plane_rot;
        let translation = t_plane - rotation * centroid;
        IppeSolution {
            rotation,
            translation,
            reproj_error: reprojection_error(&rotation, &translation, model, image),
        }
    });

    for s in &solutions {
        let finite = s.rotation.iter().all(|x| x.is_finite())
            && s.translation.iter().all(|x| x.is_finite())
            && s.reproj_error.is_finite();
        if !finite {
            return Err(IppeError::Degenerate("non-finite pose"));
        }
    }

    if solutions[0].reproj_error > solutions[1].reproj_error {
        solutions.swap(0, 1);
    }
    Ok(solutions)
}

/// Centroid and a proper rotation taking the model plane onto `z = 0`.
fn fit_model_plane(model: &[Vec3]) -> (Vec3, Mat3) {
    let centroid = model.iter().sum::<Vec3>() / model.len() as Real;
    let cov = model.iter().fold(Mat3::zeros(), |acc, p| {
        let d = p - centroid;
        acc + d * d.transpose()
    });

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let e1: Vec3 = eig.eigenvectors.column(order[0]).into_owned();
    let normal: Vec3 = eig.eigenvectors.column(order[2]).into_owned();
    let e2 = normal.cross(&e1);

    // rows e1, e2, normal; e1 x e2 = normal so det = +1
    let rot = Mat3::from_rows(&[e1.transpose(), e2.transpose(), normal.transpose()]);
    (centroid, rot)
}

/// The two rotations consistent with the homography Jacobian `j` at the
/// model origin, which projects to `v`.
fn decompose_jacobian(v: &Vec2, j: &Matrix2<Real>) -> Result<(Mat3, Mat3), IppeError> {
    let t = v.norm();
    let rv = if t < Real::EPSILON {
        Mat3::identity()
    } else {
        // rotation taking the optical axis onto the ray through v
        let s = (t * t + 1.0).sqrt();
        let costh = 1.0 / s;
        let sinth = (1.0 - 1.0 / (s * s)).sqrt();
        #[rustfmt::skip]
        let k = Mat3::new(
            0.0, 0.0, v.x,
            0.0, 0.0, v.y,
            -v.x, -v.y, 0.0,
        ) / t;
        Mat3::identity() + k * sinth + k * k * (1.0 - costh)
    };

    let rv_xy: Matrix3x2<Real> = rv.fixed_columns::<2>(0).into_owned();
    #[rustfmt::skip]
    let proj = nalgebra::Matrix2x3::new(
        1.0, 0.0, -v.x,
        0.0, 1.0, -v.y,
    );
    let b = proj * rv_xy;
    let b_inv = b
        .try_inverse()
        .ok_or(IppeError::Degenerate("singular corrective projection"))?;

    let a = b_inv * j;
    let aat = a * a.transpose();
    let gamma = (0.5
        * (aat[(0, 0)]
            + aat[(1, 1)]
            + ((aat[(0, 0)] - aat[(1, 1)]).powi(2) + 4.0 * aat[(0, 1)].powi(2)).sqrt()))
    .sqrt();
    if gamma <= Real::EPSILON {
        return Err(IppeError::Degenerate("zero homography scale"));
    }

    let r22 = a / gamma;
    let h = Matrix2::identity() - r22.transpose() * r22;
    let mut b_vec = Vec2::new(h[(0, 0)].max(0.0).sqrt(), h[(1, 1)].max(0.0).sqrt());
    if h[(0, 1)] < 0.0 {
        b_vec.y = -b_vec.y;
    }

    let v1 = Vec3::new(r22[(0, 0)], r22[(1, 0)], b_vec.x);
    let v2 = Vec3::new(r22[(0, 1)], r22[(1, 1)], b_vec.y);
    let d = v1.cross(&v2);
    let (c, a_33) = (Vec2::new(d.x, d.y), d.z);

    #[rustfmt::skip]
    let r1 = rv * Mat3::new(
        r22[(0, 0)], r22[(0, 1)], c.x,
        r22[(1, 0)], r22[(1, 1)], c.y,
        b_vec.x, b_vec.y, a_33,
    );
    #[rustfmt::skip]
    let r2 = rv * Mat3::new(
        r22[(0, 0)], r22[(0, 1)], -c.x,
        r22[(1, 0)], r22[(1, 1)], -c.y,
        -b_vec.x, -b_vec.y, a_33,
    );
    Ok((r1, r2))
}

/// Least-squares translation for a known rotation of the `z = 0` model.
///
/// Each point gives two linear equations in `t`; they are solved through
/// the 3x3 normal equations.
fn estimate_translation(rotation: &Mat3, plane_pts: &[Pt2], image: &[Vec2]) -> Vec3 {
    let mut ata = Mat3::zeros();
    let mut atb = Vec3::zeros();
    for (p, q) in plane_pts.iter().zip(image.iter()) {
        let ps = rotation * Vec3::new(p.x, p.y, 0.0);
        let rows = [
            (Vec3::new(1.0, 0.0, -q.x), q.x * ps.z - ps.x),
            (Vec3::new(0.0, 1.0, -q.y), q.y * ps.z - ps.y),
        ];
        for (row, rhs) in rows {
            ata += row * row.transpose();
            atb += row * rhs;
        }
    }
    // singular only for fewer than two distinct rays; the caller's finite check reports it
    ata.try_inverse()
        .map(|inv| inv * atb)
        .unwrap_or_else(|| Vec3::repeat(Real::NAN))
}

fn reprojection_error(rotation: &Mat3, translation: &Vec3, model: &[Vec3], image: &[Vec2]) -> Real {
    model
        .iter()
        .zip(image.iter())
        .map(|(p, q)| {
            let c = rotation * p + translation;
            (Vec2::new(c.x / c.z, c.y / c.z) - q).norm_squared()
        })
        .sum::<Real>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(rotation: &Mat3, translation: &Vec3, model: &[Vec3]) -> Vec<Vec2> {
        model
            .iter()
            .map(|p| {
                let c = rotation * p + translation;
                Vec2::new(c.x / c.z, c.y / c.z)
            })
            .collect()
    }

    fn square(z: Real) -> Vec<Vec3> {
        vec![
            Vec3::new(-0.5, -0.5, z),
            Vec3::new(0.5, -0.5, z),
            Vec3::new(0.5, 0.5, z),
            Vec3::new(-0.5, 0.5, z),
        ]
    }

    fn assert_recovers(model: &[Vec3], gt: &Pose) {
        let r = gt.rotation_matrix();
        let image = project(&r, &gt.translation, model);
        let [best, other] = solve_ippe(model, &image).unwrap();

        assert!(best.reproj_error <= other.reproj_error);
        assert!(best.reproj_error < 1e-9, "err {}", best.reproj_error);
        assert!((best.rotation - r).norm() < 1e-6, "R = {}", best.rotation);
        assert!((best.translation - gt.translation).norm() < 1e-6);
        assert!((best.rotation.determinant() - 1.0).abs() < 1e-9);
        assert!((other.rotation.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recovers_tilted_pose() {
        let gt = Pose::from_rot_vec(Vec3::new(0.4, -0.3, 0.2), Vec3::new(0.1, -0.2, 4.0));
        assert_recovers(&square(0.0), &gt);
    }

    #[test]
    fn recovers_off_center_model() {
        let model: Vec<Vec3> = square(0.0)
            .iter()
            .map(|p| p + Vec3::new(0.3, -0.7, 0.0))
            .collect();
        let gt = Pose::from_rot_vec(Vec3::new(-0.5, 0.2, 1.0), Vec3::new(-0.4, 0.3, 3.0));
        assert_recovers(&model, &gt);
    }

    #[test]
    fn recovers_model_in_arbitrary_plane() {
        let tilt = Pose::from_rot_vec(Vec3::new(1.1, 0.3, -0.4), Vec3::new(0.2, 0.1, -0.3));
        let model: Vec<Vec3> = square(0.0).iter().map(|p| tilt.rotate_translate(p)).collect();
        let gt = Pose::from_rot_vec(Vec3::new(0.3, 0.6, -0.2), Vec3::new(0.0, 0.5, 5.0));
        assert_recovers(&model, &gt);
    }

    #[test]
    fn fronto_parallel_solutions_coincide() {
        let gt = Pose::from_translation(Vec3::new(0.0, 0.0, 2.0));
        let model = square(0.0);
        let image = project(&gt.rotation_matrix(), &gt.translation, &model);
        let [a, b] = solve_ippe(&model, &image).unwrap();
        assert!(a.reproj_error < 1e-9 && b.reproj_error < 1e-9);
        assert!((a.rotation - b.rotation).norm() < 1e-6);
    }

    #[test]
    fn second_solution_is_the_mirror() {
        let gt = Pose::from_rot_vec(Vec3::new(0.6, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0));
        let model = square(0.0);
        let image = project(&gt.rotation_matrix(), &gt.translation, &model);
        let [a, b] = solve_ippe(&model, &image).unwrap();
        // both explain the data almost equally at this distance, but differ in rotation
        assert!((a.rotation - b.rotation).norm() > 0.1);
        assert!(a.reproj_error <= b.reproj_error);
    }

    #[test]
    fn rejects_bad_input() {
        let model = square(0.0);
        let image = vec![Vec2::zeros(); 3];
        assert!(matches!(
            solve_ippe(&model, &image),
            Err(IppeError::MismatchedPoints { .. })
        ));
        assert_eq!(
            solve_ippe(&model[..3], &image),
            Err(IppeError::NotEnoughPoints(3))
        );
        let collapsed = vec![Vec2::new(0.1, 0.1); 4];
        assert!(solve_ippe(&model, &collapsed).is_err());
    }
}

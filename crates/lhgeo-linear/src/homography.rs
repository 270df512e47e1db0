use crate::math::normalize_points_2d;
use lhgeo_core::{Mat3, Pt2, Real};
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point counts differ: {src} model vs {dst} image")]
    MismatchedPoints { src: usize, dst: usize },
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
}

/// Estimate H such that `dst ~ H * src` using the normalized DLT.
///
/// Both point sets are Hartley-normalized, the 3N×9 cross-product constraint
/// matrix is solved by SVD, and the result is denormalized and scaled so
/// that `H[2,2] = 1`.
pub fn dlt_homography(src: &[Pt2], dst: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = src.len();
    if dst.len() != n {
        return Err(HomographyError::MismatchedPoints {
            src: n,
            dst: dst.len(),
        });
    }
    if n < 4 {
        return Err(HomographyError::NotEnoughPoints(n));
    }

    let (src_n, t1) = normalize_points_2d(src).ok_or(HomographyError::Degenerate)?;
    let (dst_n, t2) = normalize_points_2d(dst).ok_or(HomographyError::Degenerate)?;

    let mut a = DMatrix::<Real>::zeros(3 * n, 9);
    for (i, (ps, pd)) in src_n.iter().zip(dst_n.iter()).enumerate() {
        let xs = [ps.x, ps.y, 1.0];
        let (x, y, w) = (pd.x, pd.y, 1.0);
        for k in 0..3 {
            a[(3 * i, 3 + k)] = -w * xs[k];
            a[(3 * i, 6 + k)] = y * xs[k];
            a[(3 * i + 1, k)] = w * xs[k];
            a[(3 * i + 1, 6 + k)] = -x * xs[k];
            a[(3 * i + 2, k)] = -y * xs[k];
            a[(3 * i + 2, 3 + k)] = x * xs[k];
        }
    }

    // null vector: right singular vector of the smallest singular value
    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(HomographyError::SvdFailed)?;

    let mut h_norm = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = v_t[(min_idx, 3 * r + c)];
        }
    }

    let t2_inv = t2.try_inverse().ok_or(HomographyError::Degenerate)?;
    let mut h = t2_inv * h_norm * t1;

    let scale = h[(2, 2)];
    if scale.abs() <= Real::EPSILON {
        return Err(HomographyError::Degenerate);
    }
    h /= scale;
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::transform_point_2d;

    #[test]
    fn basic_homography() {
        let w = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let img = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
        ];

        let h = dlt_homography(&w, &img).unwrap();
        assert!((h[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((h[(2, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn recovers_projective_map() {
        #[rustfmt::skip]
        let h_gt = Mat3::new(
            1.2, 0.1, -0.3,
            -0.05, 0.9, 0.2,
            0.02, -0.04, 1.0,
        );
        let src: Vec<Pt2> = [(-0.5, -0.2), (0.4, -0.3), (0.6, 0.5), (-0.3, 0.4), (0.05, 0.1)]
            .iter()
            .map(|&(x, y)| Pt2::new(x, y))
            .collect();
        let dst: Vec<Pt2> = src.iter().map(|p| transform_point_2d(&h_gt, p)).collect();

        let h = dlt_homography(&src, &dst).unwrap();
        assert!((h - h_gt).norm() < 1e-9, "H = {h}");
    }

    #[test]
    fn rejects_bad_input() {
        let p = vec![Pt2::new(0.0, 0.0); 3];
        assert_eq!(
            dlt_homography(&p, &p),
            Err(HomographyError::NotEnoughPoints(3))
        );
        assert!(matches!(
            dlt_homography(&p, &p[..2]),
            Err(HomographyError::MismatchedPoints { .. })
        ));
        let same = vec![Pt2::new(1.0, 1.0); 4];
        assert_eq!(dlt_homography(&same, &same), Err(HomographyError::Degenerate));
    }
}

//! Closed-form solvers for base station geometry.
//!
//! - [`dlt_homography`]: normalized DLT plane-to-image homography,
//! - [`solve_ippe`]: two-solution planar pose (IPPE),
//! - [`PlanarPoseSolver`]: IPPE applied to the sensor deck seen by one base station,
//! - [`InitialEstimator`]: mirror disambiguation and chaining across samples.

mod homography;
mod initial_estimator;
mod ippe;
pub mod math;
mod planar_pose;

pub use homography::*;
pub use initial_estimator::*;
pub use ippe::*;
pub use planar_pose::*;

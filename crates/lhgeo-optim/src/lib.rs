//! Non-linear refinement of base station geometry.
//!
//! [`GeometrySolver`] runs a bundle adjustment over all base station and
//! platform poses, starting from a linear initial estimate.
//! [`SystemAligner`] then moves the solved system into a frame defined by
//! a few reference samples.
//!
//! The bundle adjustment is a sparse factor graph solved with `tiny-solver`.
//! The alignment fit is small and dense, so it goes through the
//! [`NllsProblem`] trait and the Levenberg-Marquardt backend in
//! [`LmBackend`]. Jacobians come from `num-dual` in both cases.

mod backend_lm;
mod factors;
pub mod problems;
mod solution;
mod traits;

pub use backend_lm::LmBackend;
pub use problems::alignment::{AlignError, Alignment, AlignmentConfig, SystemAligner};
pub use problems::geometry::{
    GeometrySolveError, GeometrySolver, GeometrySolverConfig, LinearSolverKind,
};
pub use solution::*;
pub use traits::*;

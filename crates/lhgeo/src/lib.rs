//! High-level entry crate for lighthouse base station geometry estimation.
//!
//! Given bearings from several base stations to the four photosensors of a
//! platform, recorded at a handful of platform positions, the toolbox
//! recovers the pose of every base station in a world frame defined by an
//! origin sample, one or more x-axis samples and one or more xy-plane
//! samples.
//!
//! ## One call
//!
//! ```no_run
//! use lhgeo::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recordings: Vec<Recording> = /* load recorded measurements */
//! # vec![];
//! let report = estimate_geometry(&recordings, &EstimationConfig::default())?;
//! for (id, geo) in &report.geometries {
//!     println!("bs {id}: origin {:?}", geo.origin);
//! }
//! println!("{}", report.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Step by step
//!
//! The stages are available on their own: [`linear::InitialEstimator`]
//! resolves the planar mirror ambiguity and chains the stations together,
//! [`optim::GeometrySolver`] refines everything jointly and
//! [`optim::SystemAligner`] / [`pipeline::SystemScaler`] move the result into
//! the world frame. [`helpers`] wraps them with `anyhow` errors.

/// Granular helper functions for custom estimation workflows.
pub mod helpers {
    pub use lhgeo_pipeline::helpers::*;
}

/// All-in-one estimation from tagged recordings.
pub mod pipeline {
    pub use lhgeo_pipeline::{
        collect_samples, estimate_from_samples, estimate_geometry, BaseStationGeometry,
        EstimationConfig, EstimationError, EstimationReport, Recording, SampleReport,
        SampleStatus, ScaleError, Scaled, ScalingConfig, SystemScaler, TypedSample,
    };
}

/// Poses, bearings, samples, matching and synthetic scenes.
pub mod core {
    pub use lhgeo_core::*;
}

/// Closed-form estimation: homography, IPPE and the initial estimator.
pub mod linear {
    pub use lhgeo_linear::*;
}

/// Least-squares refinement and alignment.
pub mod optim {
    pub use lhgeo_optim::*;
}

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use crate::core::{
        AngleVector, AngleVectorSet, BsId, MatchedSample, Measurement, Pose, SampleType,
        SensorGeometry, SystemPoses, Vec3,
    };
    pub use crate::linear::{InitialEstimator, InitialEstimatorConfig};
    pub use crate::optim::{GeometrySolution, GeometrySolver, GeometrySolverConfig, SystemAligner};
    pub use crate::pipeline::{
        estimate_geometry, EstimationConfig, EstimationReport, Recording, ScalingConfig,
    };
}

use lhgeo_core::SampleType;
use lhgeo_linear::InitialEstimateError;
use lhgeo_optim::{AlignError, GeometrySolveError};
use thiserror::Error;

use crate::ScaleError;

/// Reasons an estimation request cannot produce a geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("no {0} sample recorded")]
    MissingSamples(SampleType),
    #[error("expected one origin sample, got {0}")]
    MultipleOrigins(usize),
    #[error("{kind} sample {index} sees {count} base station(s), at least 2 are needed")]
    TooFewStations {
        kind: SampleType,
        index: usize,
        count: usize,
    },
    #[error("{kind} sample {index} was rejected as an outlier")]
    MandatorySampleRejected { kind: SampleType, index: usize },
    #[error(transparent)]
    InitialEstimate(#[from] InitialEstimateError),
    #[error(transparent)]
    Solve(#[from] GeometrySolveError),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

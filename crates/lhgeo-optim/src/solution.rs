//! Result of a geometry solve and its fit statistics.

use lhgeo_core::{BsId, Real, SystemPoses};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Mean, maximum and population standard deviation of a set of errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub mean: Real,
    pub max: Real,
    pub std: Real,
}

impl ErrorStats {
    /// `None` for an empty input.
    pub fn from_values(values: &[Real]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as Real;
        let mean = values.iter().sum::<Real>() / n;
        let max = values.iter().copied().fold(Real::NEG_INFINITY, Real::max);
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<Real>() / n;
        Some(Self {
            mean,
            max,
            std: var.sqrt(),
        })
    }
}

/// Error statistics over all observations and per base station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub overall: ErrorStats,
    pub per_bs: BTreeMap<BsId, ErrorStats>,
}

impl ErrorInfo {
    pub fn from_sample_errors(sample_errors: &[BTreeMap<BsId, Real>]) -> Self {
        let mut all = Vec::new();
        let mut by_bs: BTreeMap<BsId, Vec<Real>> = BTreeMap::new();
        for errors in sample_errors {
            for (id, e) in errors {
                all.push(*e);
                by_bs.entry(*id).or_default().push(*e);
            }
        }
        Self {
            overall: ErrorStats::from_values(&all).unwrap_or_default(),
            per_bs: by_bs
                .into_iter()
                .filter_map(|(id, v)| ErrorStats::from_values(&v).map(|s| (id, s)))
                .collect(),
        }
    }
}

/// Refined poses plus convergence diagnostics.
///
/// A solve that did not converge still carries its last iterate; check
/// `converged` before trusting the poses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometrySolution {
    pub poses: SystemPoses,
    pub converged: bool,
    /// Levenberg-Marquardt iterations, counted as linearizations of the problem.
    pub iterations: usize,
    pub final_cost: Real,
    /// Residual norm of each station in each sample, in metres.
    pub sample_errors: Vec<BTreeMap<BsId, Real>>,
    pub error_info: ErrorInfo,
}

impl GeometrySolution {
    /// Multi-line, operator-facing description of the fit.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let status = if self.converged {
            "converged"
        } else {
            "did not converge"
        };
        let _ = writeln!(
            out,
            "solver {} after {} iterations (cost {:.3e})",
            status, self.iterations, self.final_cost
        );
        let _ = writeln!(out, "  all: {}", format_stats(&self.error_info.overall));
        for (id, stats) in &self.error_info.per_bs {
            let _ = writeln!(out, "  bs {:>2}: {}", id, format_stats(stats));
        }
        out
    }
}

fn format_stats(s: &ErrorStats) -> String {
    format!(
        "mean {:.2} mm, max {:.2} mm, std {:.2} mm",
        s.mean * 1000.0,
        s.max * 1000.0,
        s.std * 1000.0
    )
}

//! End-to-end base station geometry estimation.
//!
//! [`estimate_geometry`] takes tagged recordings and runs matching,
//! validation, the linear initial estimate, bundle adjustment, alignment
//! and scaling, returning an [`EstimationReport`]. The [`helpers`] module
//! exposes the same steps for custom workflows.

mod config;
mod error;
pub mod helpers;
mod pipeline;
mod scale;

pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use scale::*;

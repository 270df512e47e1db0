//! Core primitives for lighthouse base-station geometry estimation.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Quat`, ...) and Rodrigues rotation,
//! - the rigid [`Pose`] used for base stations and platform samples,
//! - bearings ([`AngleVector`], [`AngleVectorSet`]) and the fixed [`SensorGeometry`],
//! - measurement containers and the temporal [`SampleMatcher`],
//! - rotation averaging and the crossing-beam error estimate,
//! - deterministic synthetic scenes for tests.
//!
//! Frames: a base station pose maps base station coordinates into the global
//! frame; a sample pose maps platform coordinates into the global frame.

/// Bearings and their alternate encodings.
pub mod angles;
/// Closest approach of two bearings.
pub mod crossing_beam;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Temporal grouping of measurements.
pub mod matcher;
pub mod pose;
pub mod rotation_mean;
pub mod sample;
pub mod sensor;
pub mod synthetic;

pub use angles::*;
pub use matcher::*;
pub use math::*;
pub use pose::*;
pub use rotation_mean::*;
pub use sample::*;
pub use sensor::*;

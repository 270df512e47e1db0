//! Deterministic synthetic data for tests and demos.
//!
//! - [`lighthouse`]: a fixed set of base station and platform poses, angle
//!   synthesis and measurement streams,
//! - [`noise`]: seeded angle noise that is stable across platforms.

pub mod lighthouse;
pub mod noise;

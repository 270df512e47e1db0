//! Least-squares problems over base station geometry.

pub mod alignment;
pub mod geometry;

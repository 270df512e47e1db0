//! Seeded angle noise.
//!
//! Uses a SplitMix64 stream keyed on `(sample, station, sensor)` instead of a
//! stateful RNG, so the same key always yields the same perturbation.

use crate::{AngleVector, AngleVectorSet, BsId, Real};

/// Uniform noise in `[-max_abs_rad, +max_abs_rad]` on both angles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleNoise {
    pub seed: u64,
    pub max_abs_rad: Real,
}

impl AngleNoise {
    pub fn new(seed: u64, max_abs_rad: Real) -> Self {
        Self { seed, max_abs_rad }
    }

    pub fn sample(&self, sample_idx: usize, bs_id: BsId, sensor: usize) -> (Real, Real) {
        let max_abs = self.max_abs_rad.abs();
        if max_abs == 0.0 {
            return (0.0, 0.0);
        }
        let key = mix_key(self.seed, sample_idx, bs_id, sensor);
        let u = u64_to_unit(splitmix64(key));
        let v = u64_to_unit(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        ((u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs)
    }

    pub fn apply(&self, sample_idx: usize, bs_id: BsId, angles: &AngleVectorSet) -> AngleVectorSet {
        let mut out = *angles;
        for (sensor, v) in out.0.iter_mut().enumerate() {
            let (dh, dv) = self.sample(sample_idx, bs_id, sensor);
            *v = AngleVector::new(v.horiz + dh, v.vert + dv);
        }
        out
    }
}

fn mix_key(seed: u64, sample_idx: usize, bs_id: BsId, sensor: usize) -> u64 {
    seed ^ (sample_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (bs_id as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
        ^ (sensor as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn u64_to_unit(x: u64) -> Real {
    // top 53 bits -> [0, 1)
    (x >> 11) as Real * (1.0 / (1u64 << 53) as Real)
}

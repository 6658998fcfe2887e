//! Cosine-weighted hemisphere sample pool shared by the AO, bent-normals, and
//! thickness solvers.
//!
//! A pool of `sample_count * PERMUTATION_COUNT` canonical samples (hemisphere
//! around `+Z`) is generated once per job; each texel deterministically picks
//! one of the `PERMUTATION_COUNT` permutations by its linear index, so two
//! texels landing on the same permutation still get independent offsets from
//! distinct permutations most of the time without per-texel RNG state.

use rand::Rng;

use crate::prelude::Vec3;

/// Number of independent Hammersley permutations precomputed into the pool.
pub const PERMUTATION_COUNT: usize = 4096;

pub struct SamplePool {
    sample_count: usize,
    samples: Vec<Vec3>,
}

impl SamplePool {
    /// Generates the full pool: `sample_count` cosine-weighted directions for
    /// each of [`PERMUTATION_COUNT`] independently-offset permutations.
    pub fn generate(sample_count: usize, rng: &mut impl Rng) -> Self {
        let mut samples = vec![Vec3::ZERO; sample_count * PERMUTATION_COUNT];
        for perm in 0..PERMUTATION_COUNT {
            let rx: u32 = rng.gen();
            let ry: u32 = rng.gen();
            let base = perm * sample_count;
            for i in 0..sample_count {
                samples[base + i] = cosine_sample(i, sample_count, rx, ry);
            }
        }
        Self {
            sample_count,
            samples,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// The `sample_count`-long slice of canonical directions a texel at
    /// `texel_index` should use, selected by `texel_index mod PERMUTATION_COUNT`.
    pub fn permutation_for(&self, texel_index: usize) -> &[Vec3] {
        let perm = texel_index % PERMUTATION_COUNT;
        let start = perm * self.sample_count;
        &self.samples[start..start + self.sample_count]
    }
}

/// One cosine-weighted hemisphere sample, via a Hammersley sequence with a
/// per-permutation random offset.
fn cosine_sample(i: usize, sample_count: usize, rx: u32, ry: u32) -> Vec3 {
    let offset_x = (rx & 0xffff) as f32 / 65536.0;
    let raw_x = i as f32 / sample_count as f32 + offset_x;
    let ux = raw_x.fract();

    let reversed = (i as u32).reverse_bits();
    let uy = (reversed ^ ry) as f64 / 4294967296.0;

    let r = ux.max(0.0).sqrt();
    let phi = std::f32::consts::TAU * uy as f32;
    let z = (1.0 - ux).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

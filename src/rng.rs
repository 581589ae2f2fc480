//! Seeded randomness source threaded through all fixture generation.
//!
//! Wraps a [`StdRng`] so that every run with the same seed consumes the same
//! random sequence in the same order, making generated data reproducible.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::SeedError;

pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Inclusive integer range. Errors when `lo > hi` (a catalog mistake).
    pub fn int_in(&mut self, lo: i64, hi: i64) -> Result<i64, SeedError> {
        if lo > hi {
            return Err(SeedError::Generation(format!(
                "empty integer range {lo}..={hi}"
            )));
        }
        Ok(self.rng.gen_range(lo..=hi))
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Bernoulli draw; `p` is clamped into `[0, 1]`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Two draws combined into 128 bits, for deterministic UUIDs.
    pub fn bits_128(&mut self) -> u128 {
        let hi = self.rng.gen::<u64>() as u128;
        let lo = self.rng.gen::<u64>() as u128;
        (hi << 64) | lo
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, SeedError> {
        if items.is_empty() {
            return Err(SeedError::Generation("choice over an empty list".into()));
        }
        let idx = self.rng.gen_range(0..items.len());
        Ok(&items[idx])
    }

    pub fn pick_weighted<'a, T>(&mut self, items: &'a [(T, u32)]) -> Result<&'a T, SeedError> {
        let dist = WeightedIndex::new(items.iter().map(|(_, w)| *w))
            .map_err(|e| SeedError::Generation(format!("invalid choice weights: {e}")))?;
        Ok(&items[dist.sample(&mut self.rng)].0)
    }

    /// `count` distinct indices out of `0..len`, via a partial Fisher-Yates
    /// shuffle. Used to give percentage policies distinct parent rows.
    pub fn distinct_indices(&mut self, len: usize, count: usize) -> Vec<usize> {
        let count = count.min(len);
        let mut pool: Vec<usize> = (0..len).collect();
        for i in 0..count {
            let j = self.rng.gen_range(i..len);
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}

//! Per-run random number streams.
//!
//! Every run owns exactly one [`RngStream`]. Replicates never share a stream: each one is seeded
//! with [`derive_replicate_seed`] so that its draws depend only on the base seed and its index,
//! never on how many siblings run at the same time.
mod sampling_algorithms;

pub use sampling_algorithms::{roulette, sample_index, sample_indices_without_replacement};

use log::trace;
use rand_distr::{Binomial, Distribution};

use crate::rand::rngs::SmallRng;
use crate::rand::{Rng, SeedableRng};

/// Seed of replicate `replicate` in a batch started from `base_seed`.
pub fn derive_replicate_seed(base_seed: u64, replicate: usize) -> u64 {
    base_seed.wrapping_add(replicate as u64)
}

/// A seeded pseudo-random source with the uniform and binomial primitives the mixing model needs.
#[derive(Clone, Debug)]
pub struct RngStream {
    seed: u64,
    rng: SmallRng,
}

impl RngStream {
    pub fn new(seed: u64) -> Self {
        RngStream {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Restarts the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        trace!("reseeding rng stream (seed={seed})");
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A uniform draw in `[0, 1)`.
    pub fn runif(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// A draw from `Binomial(n, p)`. `p` is clamped into `[0, 1]`; degenerate cases return
    /// without consuming any randomness.
    pub fn rbinom(&mut self, n: usize, p: f64) -> usize {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        if n == 0 || p == 0.0 {
            return 0;
        }
        if p == 1.0 {
            return n;
        }
        match Binomial::new(n as u64, p) {
            #[allow(clippy::cast_possible_truncation)]
            Ok(binomial) => binomial.sample(&mut self.rng) as usize,
            // Unreachable after clamping.
            Err(_) => 0,
        }
    }

    /// Runs the event selector with a fresh uniform draw. See [`roulette`].
    pub fn roulette(&mut self, weights: &[f64]) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }
        let u = self.runif();
        roulette(weights, u)
    }

    /// `requested` distinct indices out of `0..len`, sorted.
    pub fn sample_without_replacement(&mut self, len: usize, requested: usize) -> Vec<usize> {
        sample_indices_without_replacement(&mut self.rng, len, requested)
    }
}

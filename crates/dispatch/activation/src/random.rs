//! Injectable randomness for choosing among equally valid matches

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of uniform choices.
pub trait RandomSource: Send + Sync {
    /// Pick an index uniformly from `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// `StdRng`-backed source, seeded for reproducible runs or from entropy.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..len),
            // poisoned: fall back to the first candidate
            Err(_) => 0,
        }
    }
}

impl std::fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

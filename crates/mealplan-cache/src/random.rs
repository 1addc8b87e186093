//! Injected randomness for cache bypass, variant selection and eviction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Source of the random decisions made by the cache and the generator.
pub trait RandomSource: Send + Sync {
    /// Returns `true` with the given probability.
    fn chance(&self, probability: f64) -> bool;

    /// Uniform index in `0..len`. Returns 0 when `len` is 0.
    fn pick(&self, len: usize) -> usize;

    /// Uniform value in `[0, 1)`, used for backoff jitter.
    fn unit(&self) -> f64;
}

/// `StdRng` behind a mutex, seedable for reproducible runs.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn chance(&self, probability: f64) -> bool {
        if probability <= 0.0 || probability.is_nan() {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(probability)
    }

    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..len)
    }

    fn unit(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .r#gen::<f64>()
    }
}

/// Replays queued decisions; falls back to "no bypass" and index 0 once drained.
#[derive(Default)]
pub struct ScriptedRandom {
    chances: Mutex<VecDeque<bool>>,
    picks: Mutex<VecDeque<usize>>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chances<I: IntoIterator<Item = bool>>(self, chances: I) -> Self {
        self.chances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(chances);
        self
    }

    pub fn with_picks<I: IntoIterator<Item = usize>>(self, picks: I) -> Self {
        self.picks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(picks);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn chance(&self, _probability: f64) -> bool {
        self.chances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }

    fn pick(&self, len: usize) -> usize {
        let next = self
            .picks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0);
        if len == 0 { 0 } else { next % len }
    }

    fn unit(&self) -> f64 {
        0.0
    }
}

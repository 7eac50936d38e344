//! Noisy query generation for the noise-robustness metric.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::NoiseConfig;

/// Distractor terms appended to each noisy query.
pub const DISTRACTOR_TERMS: &[&str] = &["function", "class", "method", "list", "dict", "tuple"];

/// Default per-character drop probability.
pub const DEFAULT_DROP_PROBABILITY: f64 = 0.1;

/// Simulates typos and off-topic contamination.
///
/// Each character is dropped independently with `drop_probability`, then a
/// space and one uniformly chosen [`DISTRACTOR_TERMS`] entry are appended.
pub struct NoiseGenerator {
    drop_probability: f64,
    rng: StdRng,
}

impl NoiseGenerator {
    /// Deterministic generator: same seed and input give the same output.
    pub fn seeded(seed: u64) -> Self {
        Self {
            drop_probability: DEFAULT_DROP_PROBABILITY,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            drop_probability: DEFAULT_DROP_PROBABILITY,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_config(config: &NoiseConfig) -> Self {
        let generator = match config.seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        };
        generator.with_drop_probability(config.drop_probability)
    }

    /// Set the drop probability, clamped to [0, 1].
    pub fn with_drop_probability(mut self, probability: f64) -> Self {
        self.drop_probability = if probability.is_nan() {
            DEFAULT_DROP_PROBABILITY
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    pub fn drop_probability(&self) -> f64 {
        self.drop_probability
    }

    /// Perturb one query.
    pub fn perturb(&mut self, query: &str) -> String {
        let mut noisy: String = query
            .chars()
            .filter(|_| !self.rng.gen_bool(self.drop_probability))
            .collect();
        let term = DISTRACTOR_TERMS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("function");
        noisy.push(' ');
        noisy.push_str(term);
        noisy
    }

    /// Perturb every query, in order.
    pub fn generate<S: AsRef<str>>(&mut self, queries: &[S]) -> Vec<String> {
        queries.iter().map(|q| self.perturb(q.as_ref())).collect()
    }
}

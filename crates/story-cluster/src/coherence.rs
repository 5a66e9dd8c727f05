//! Lexical coherence of a cluster.
//!
//! Coherence is the mean pairwise Jaccard similarity between the token sets
//! of a cluster's members. Clusters with more tokenized members than the
//! sample cap are scored on a random sample of that size. Without a seed the
//! sample differs from run to run.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::tokenize::{jaccard, TokenSet};

/// Scores coherence with an optional seeded sampler.
#[derive(Debug)]
pub struct CoherenceScorer {
    sample_cap: usize,
    rng: StdRng,
}

impl CoherenceScorer {
    /// Create a scorer.
    ///
    /// `sample_cap` is floored at 2. With `seed` set, sampling is
    /// reproducible for the same sequence of calls.
    pub fn new(sample_cap: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            sample_cap: sample_cap.max(2),
            rng,
        }
    }

    pub fn sample_cap(&self) -> usize {
        self.sample_cap
    }

    /// Mean pairwise Jaccard over members with non-empty token sets.
    ///
    /// Returns `None` when fewer than two members have tokens.
    pub fn score(&mut self, token_sets: &[&TokenSet]) -> Option<f64> {
        let mut usable: Vec<&TokenSet> = token_sets
            .iter()
            .copied()
            .filter(|set| !set.is_empty())
            .collect();

        if usable.len() < 2 {
            return None;
        }

        if usable.len() > self.sample_cap {
            let mut picked = index::sample(&mut self.rng, usable.len(), self.sample_cap).into_vec();
            picked.sort_unstable();
            usable = picked.into_iter().map(|i| usable[i]).collect();
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..usable.len() {
            for j in (i + 1)..usable.len() {
                total += jaccard(usable[i], usable[j]);
                pairs += 1;
            }
        }

        Some(total / pairs as f64)
    }
}

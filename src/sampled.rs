//! Maximum-likelihood MDP estimation from samples.
//!
//! The estimator keeps an *unnormalized* MDP: each incoming sample adds its
//! weight to the `(s, a, s')` probability slot and folds its reward into the
//! weighted mean (exactly the [`crate::Transition`] merge rule), alongside a
//! per-`(s, a)` cumulative weight. Extraction divides by the cumulative
//! weights, so per-`(s, a)` probabilities sum to 1 wherever any mass was
//! observed. Adding samples never discards earlier ones.

use crate::{Error, Mdp, Result, Sample, Samples, Transition};

/// Incremental estimator of an MDP from weighted transition samples.
#[derive(Debug, Clone, Default)]
pub struct SampledMdp {
    mdp: Mdp,
    weights: Vec<Vec<f64>>,
    initial_counts: Vec<f64>,
}

impl SampledMdp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a whole sample store into the estimate.
    pub fn add_samples(&mut self, samples: &Samples) -> Result<()> {
        for sample in samples.samples() {
            self.add_sample(sample)?;
        }
        for &state in samples.initial() {
            self.add_initial(state);
        }
        Ok(())
    }

    /// Fold one weighted transition sample into the estimate.
    pub fn add_sample(&mut self, sample: &Sample) -> Result<()> {
        if !sample.weight.is_finite() || sample.weight < 0.0 {
            return Err(Error::InvalidParameter {
                what: "sample weight",
                value: sample.weight,
            });
        }
        self.mdp.add_transition(
            sample.state_from,
            sample.action,
            sample.state_to,
            sample.weight,
            sample.reward,
        )?;
        while self.weights.len() < self.mdp.state_count() {
            self.weights.push(Vec::new());
        }
        let row = &mut self.weights[sample.state_from];
        while row.len() <= sample.action {
            row.push(0.0);
        }
        row[sample.action] += sample.weight;
        Ok(())
    }

    /// Record one initial-state observation.
    pub fn add_initial(&mut self, state: usize) {
        if self.initial_counts.len() <= state {
            self.initial_counts.resize(state + 1, 0.0);
        }
        self.initial_counts[state] += 1.0;
    }

    /// Cumulative weight observed for `(s, a)` (0 if never seen).
    pub fn weight(&self, state: usize, action: usize) -> f64 {
        self.weights
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of states touched by any sample so far.
    pub fn state_count(&self) -> usize {
        self.mdp.state_count()
    }

    /// The current maximum-likelihood MDP (normalized copy).
    pub fn mdp(&self) -> Mdp {
        let mut mdp = self.mdp.clone();
        mdp.normalize();
        mdp
    }

    /// Empirical initial distribution over the states of the current
    /// estimate, normalized; empty if no initial samples were recorded.
    pub fn initial_distribution(&self) -> Transition {
        let total: f64 = self.initial_counts.iter().sum();
        let mut dist = Transition::new();
        if total > 0.0 {
            for (state, &count) in self.initial_counts.iter().enumerate() {
                if count > 0.0 {
                    // Counts are non-negative, so this cannot fail.
                    let _ = dist.add_sample(state, count / total, 0.0);
                }
            }
        }
        dist
    }
}

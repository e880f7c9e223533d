//! Sparse transition rows.
//!
//! A [`Transition`] is one row of a transition matrix stored as three parallel
//! vectors (next-state indices, probabilities, per-sample rewards) kept in
//! strictly ascending index order. Rows may be unnormalized while a model is
//! being built or estimated; [`Transition::normalize`] rescales to unit mass.

use crate::{Error, Result, NORMALIZED_TOL};

/// A sparse distribution over next states with per-next-state rewards.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    indices: Vec<usize>,
    probabilities: Vec<f64>,
    rewards: Vec<f64>,
}

impl Transition {
    /// Create an empty transition (zero mass; terminal if left this way).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transition from parallel vectors.
    ///
    /// Indices must be strictly ascending and probabilities non-negative.
    pub fn from_parts(
        indices: Vec<usize>,
        probabilities: Vec<f64>,
        rewards: Vec<f64>,
    ) -> Result<Self> {
        if indices.len() != probabilities.len() || indices.len() != rewards.len() {
            return Err(Error::ShapeMismatch {
                what: "transition parallel vectors",
                expected: indices.len(),
                found: probabilities.len().max(rewards.len()),
            });
        }
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Unsupported(
                "transition indices must be strictly ascending",
            ));
        }
        for &p in &probabilities {
            if !p.is_finite() || p < 0.0 {
                return Err(Error::InvalidParameter {
                    what: "probability",
                    value: p,
                });
            }
        }
        Ok(Self {
            indices,
            probabilities,
            rewards,
        })
    }

    /// A deterministic transition to `next` with the given reward.
    pub fn deterministic(next: usize, reward: f64) -> Self {
        Self {
            indices: vec![next],
            probabilities: vec![1.0],
            rewards: vec![reward],
        }
    }

    /// Build a transition from a dense probability vector (rewards 0).
    ///
    /// Entries at or below `ignore_threshold` are dropped.
    pub fn from_probabilities(probabilities: &[f64], ignore_threshold: f64) -> Result<Self> {
        let mut t = Self::new();
        for (i, &p) in probabilities.iter().enumerate() {
            if p > ignore_threshold {
                t.add_sample(i, p, 0.0)?;
            }
        }
        Ok(t)
    }

    /// Add probability mass (and a reward sample) for next state `next`.
    ///
    /// If `next` is already present, probabilities add and the reward becomes
    /// the probability-weighted mean of the old and new rewards. Zero
    /// probability is legal; negative probability is rejected.
    pub fn add_sample(&mut self, next: usize, probability: f64, reward: f64) -> Result<()> {
        if !probability.is_finite() || probability < 0.0 {
            return Err(Error::InvalidParameter {
                what: "probability",
                value: probability,
            });
        }
        match self.indices.binary_search(&next) {
            Ok(pos) => {
                let old_p = self.probabilities[pos];
                let total = old_p + probability;
                if total > 0.0 {
                    self.rewards[pos] =
                        (self.rewards[pos] * old_p + reward * probability) / total;
                } else {
                    // Merging onto zero mass: keep the newer reward sample.
                    self.rewards[pos] = reward;
                }
                self.probabilities[pos] = total;
            }
            Err(pos) => {
                self.indices.insert(pos, next);
                self.probabilities.insert(pos, probability);
                self.rewards.insert(pos, reward);
            }
        }
        Ok(())
    }

    /// Number of stored (index, probability, reward) triples.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the row stores no triples at all.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Next-state indices, ascending.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Probabilities, parallel to [`Transition::indices`].
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Rewards, parallel to [`Transition::indices`].
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Next-state index of the `i`-th triple.
    pub fn index(&self, i: usize) -> Result<usize> {
        self.indices
            .get(i)
            .copied()
            .ok_or(Error::OutOfRange {
                what: "transition sample",
                index: i,
                len: self.indices.len(),
            })
    }

    /// Probability of the `i`-th triple.
    pub fn probability(&self, i: usize) -> Result<f64> {
        self.probabilities
            .get(i)
            .copied()
            .ok_or(Error::OutOfRange {
                what: "transition sample",
                index: i,
                len: self.probabilities.len(),
            })
    }

    /// Reward of the `i`-th triple.
    pub fn reward(&self, i: usize) -> Result<f64> {
        self.rewards.get(i).copied().ok_or(Error::OutOfRange {
            what: "transition sample",
            index: i,
            len: self.rewards.len(),
        })
    }

    /// Overwrite the reward of the `i`-th triple.
    pub fn set_reward(&mut self, i: usize, reward: f64) -> Result<()> {
        let len = self.rewards.len();
        match self.rewards.get_mut(i) {
            Some(r) => {
                *r = reward;
                Ok(())
            }
            None => Err(Error::OutOfRange {
                what: "transition sample",
                index: i,
                len,
            }),
        }
    }

    /// Probability mass stored for next state `next` (0 if absent).
    pub fn probability_of(&self, next: usize) -> f64 {
        match self.indices.binary_search(&next) {
            Ok(pos) => self.probabilities[pos],
            Err(_) => 0.0,
        }
    }

    /// Reward stored for next state `next` (0 if absent).
    pub fn reward_of(&self, next: usize) -> f64 {
        match self.indices.binary_search(&next) {
            Ok(pos) => self.rewards[pos],
            Err(_) => 0.0,
        }
    }

    /// Largest next-state index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// Total probability mass.
    pub fn sum_probabilities(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Whether the mass is 0 (terminal / unpopulated) or 1 (normalized).
    pub fn is_normalized(&self) -> bool {
        let sum = self.sum_probabilities();
        sum == 0.0 || (sum - 1.0).abs() <= NORMALIZED_TOL
    }

    /// Rescale probabilities to unit mass. No-op on zero mass.
    pub fn normalize(&mut self) {
        let sum = self.sum_probabilities();
        if sum > 0.0 {
            for p in &mut self.probabilities {
                *p /= sum;
            }
        }
    }

    /// Expand to a dense probability vector of length `size` (zeros elsewhere).
    pub fn probability_vector(&self, size: usize) -> Result<Vec<f64>> {
        if let Some(max) = self.max_index() {
            if max >= size {
                return Err(Error::ShapeMismatch {
                    what: "dense probability vector",
                    expected: max + 1,
                    found: size,
                });
            }
        }
        let mut dense = vec![0.0; size];
        for (&i, &p) in self.indices.iter().zip(&self.probabilities) {
            dense[i] = p;
        }
        Ok(dense)
    }

    /// Expected value ∑ᵢ pᵢ·(rᵢ + γ·V\[nextᵢ\]).
    ///
    /// `value` must cover every stored index; solvers validate this once per
    /// solve rather than per backup.
    pub fn expected_value(&self, value: &[f64], discount: f64) -> f64 {
        debug_assert!(self.max_index().map_or(true, |m| m < value.len()));
        let mut total = 0.0;
        for ((&i, &p), &r) in self
            .indices
            .iter()
            .zip(&self.probabilities)
            .zip(&self.rewards)
        {
            total += p * (r + discount * value[i]);
        }
        total
    }
}

//! Dense-matrix ingestion and extraction.
//!
//! The sparse model is the source of truth; these routines exist for callers
//! that hold `[|S| × |S| × |A|]` transition tensors and `[|S| × |A|]` reward
//! matrices. Ingestion drops entries at or below an ignore threshold (the
//! sparsity filter); extraction requires a uniform action count.

use ndarray::{Array2, Array3};

use crate::{Error, Mdp, Result, Rmdp};

/// Entries of a dense transition tensor at or below this are dropped.
pub const DEFAULT_IGNORE_THRESHOLD: f64 = 1e-10;

impl Mdp {
    /// Build an MDP from a dense transition tensor `T[s, s', a]` and reward
    /// matrix `R[s, a]`.
    ///
    /// `T[s, s', a] ≤ ignore_threshold` is discarded; the reward `R[s, a]`
    /// is attached to every surviving next state of `(s, a)`.
    pub fn from_matrices(
        transitions: &Array3<f64>,
        rewards: &Array2<f64>,
        ignore_threshold: f64,
    ) -> Result<Self> {
        let (n, n2, action_count) = transitions.dim();
        if n != n2 {
            return Err(Error::ShapeMismatch {
                what: "transition tensor state dimensions",
                expected: n,
                found: n2,
            });
        }
        if rewards.dim() != (n, action_count) {
            return Err(Error::ShapeMismatch {
                what: "reward matrix rows",
                expected: n * action_count,
                found: rewards.dim().0 * rewards.dim().1,
            });
        }

        let mut mdp = Mdp::new();
        if n > 0 {
            mdp.ensure_state(n - 1);
        }
        for s in 0..n {
            for a in 0..action_count {
                for sn in 0..n {
                    let p = transitions[[s, sn, a]];
                    if p > ignore_threshold {
                        mdp.add_transition(s, a, sn, p, rewards[[s, a]])?;
                    }
                }
            }
        }
        Ok(mdp)
    }

    /// Extract `(T, R)` with `T[s, s', a]` and `R[s, a] = Σ_s' T·r`.
    ///
    /// Requires every state to carry the same number of actions.
    pub fn to_matrices(&self) -> Result<(Array3<f64>, Array2<f64>)> {
        if !self.is_uniform() {
            return Err(Error::Unsupported(
                "matrix extraction requires a uniform action count per state",
            ));
        }
        let n = self.state_count();
        let action_count = self.states().first().map_or(0, |s| s.action_count());
        let mut transitions = Array3::zeros((n, n, action_count));
        let mut rewards = Array2::zeros((n, action_count));
        for (s, state) in self.states().iter().enumerate() {
            for (a, action) in state.actions().iter().enumerate() {
                let t = action.transition();
                for ((&sn, &p), &r) in t
                    .indices()
                    .iter()
                    .zip(t.probabilities())
                    .zip(t.rewards())
                {
                    transitions[[s, sn, a]] = p;
                    rewards[[s, a]] += p * r;
                }
            }
        }
        Ok((transitions, rewards))
    }
}

impl Rmdp {
    /// Build an RMDP from dense slices.
    ///
    /// Slice `i` of the tensor (and column `i` of the reward matrix)
    /// populates outcome `outcomes[i]` of action `actions[i]`; the
    /// `(action, outcome)` pairs must be unique. Base distributions start
    /// uniform over each action's outcomes and thresholds start at 0.
    pub fn from_matrices(
        transitions: &Array3<f64>,
        rewards: &Array2<f64>,
        actions: &[usize],
        outcomes: &[usize],
        ignore_threshold: f64,
    ) -> Result<Self> {
        let (n, n2, slice_count) = transitions.dim();
        if n != n2 {
            return Err(Error::ShapeMismatch {
                what: "transition tensor state dimensions",
                expected: n,
                found: n2,
            });
        }
        if rewards.dim() != (n, slice_count) {
            return Err(Error::ShapeMismatch {
                what: "reward matrix rows",
                expected: n * slice_count,
                found: rewards.dim().0 * rewards.dim().1,
            });
        }
        if actions.len() != slice_count || outcomes.len() != slice_count {
            return Err(Error::ShapeMismatch {
                what: "action/outcome slice maps",
                expected: slice_count,
                found: actions.len().min(outcomes.len()),
            });
        }
        for i in 0..slice_count {
            for j in (i + 1)..slice_count {
                if actions[i] == actions[j] && outcomes[i] == outcomes[j] {
                    return Err(Error::InvalidParameter {
                        what: "duplicate (action, outcome) slice",
                        value: j as f64,
                    });
                }
            }
        }

        let mut rmdp = Rmdp::new();
        if n > 0 {
            rmdp.ensure_state(n - 1);
        }
        for (i, (&a, &o)) in actions.iter().zip(outcomes).enumerate() {
            for s in 0..n {
                for sn in 0..n {
                    let p = transitions[[s, sn, i]];
                    if p > ignore_threshold {
                        rmdp.add_transition(s, a, o, sn, p, rewards[[s, i]])?;
                    }
                }
            }
        }
        for state_id in 0..rmdp.state_count() {
            for action_id in 0..rmdp.action_count(state_id)? {
                rmdp.action_mut(state_id, action_id).uniform_distribution();
            }
        }
        Ok(rmdp)
    }
}

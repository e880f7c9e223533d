//! Nominal and L1-robust actions.
//!
//! A [`RegularAction`] owns one [`Transition`]; an [`L1OutcomeAction`] owns a
//! set of outcome transitions, a base distribution over them, and an L1
//! budget the adversary may spend perturbing that distribution. The
//! [`ActionValue`] trait is the seam that lets every solver run unchanged
//! over both: it yields the action's backed-up value under an
//! [`Uncertainty`] mode, plus the realized outcome distribution for robust
//! models.

use crate::{bestcase_l1, validate_distribution, worstcase_l1, Error, Result, Transition};

/// How the adversary treats the outcome distribution during a backup.
///
/// Encoded as a sum type and dispatched once per backup; the inner loops see
/// a single branch, not a runtime mode check per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Uncertainty {
    /// Expectation under the base distribution.
    Average,
    /// Worst case over the L1 ball around the base distribution.
    Robust,
    /// Best case over the same ball.
    Optimistic,
}

/// Result of backing up one action: its value and, for robust actions, the
/// distribution over outcomes that realizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupValue {
    pub value: f64,
    /// Realized outcome distribution; `None` for nominal actions.
    pub distribution: Option<Vec<f64>>,
}

impl BackupValue {
    pub(crate) fn plain(value: f64) -> Self {
        Self {
            value,
            distribution: None,
        }
    }
}

/// The solver-facing interface of an action.
pub trait ActionValue {
    /// Backed-up value of this action under `uncertainty`.
    fn value(&self, value: &[f64], discount: f64, uncertainty: Uncertainty) -> Result<BackupValue>;

    /// Value under a fixed "nature" choice: the given outcome distribution
    /// for robust actions (base distribution if `None`); nominal actions
    /// ignore `nature`.
    fn value_fixed(&self, value: &[f64], discount: f64, nature: Option<&[f64]>) -> Result<f64>;

    /// Validate the action before a solve; `state` and `action` are its
    /// coordinates, used only for error context.
    fn validate(&self, state: usize, action: usize) -> Result<()>;
}

/// An action with a single nominal next-state distribution.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegularAction {
    transition: Transition,
}

impl RegularAction {
    pub fn new(transition: Transition) -> Self {
        Self { transition }
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn transition_mut(&mut self) -> &mut Transition {
        &mut self.transition
    }
}

impl ActionValue for RegularAction {
    fn value(
        &self,
        value: &[f64],
        discount: f64,
        _uncertainty: Uncertainty,
    ) -> Result<BackupValue> {
        Ok(BackupValue::plain(
            self.transition.expected_value(value, discount),
        ))
    }

    fn value_fixed(&self, value: &[f64], discount: f64, _nature: Option<&[f64]>) -> Result<f64> {
        Ok(self.transition.expected_value(value, discount))
    }

    fn validate(&self, state: usize, action: usize) -> Result<()> {
        if !self.transition.is_normalized() {
            return Err(Error::NotNormalized {
                state,
                action,
                sum: self.transition.sum_probabilities(),
            });
        }
        Ok(())
    }
}

/// An action whose next-state behavior is a distribution over *outcomes*,
/// adversarially perturbable within an L1 ball of radius `threshold`.
///
/// The outcomes themselves (transitions and rewards) are never perturbed;
/// only the mass assigned to them is.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L1OutcomeAction {
    outcomes: Vec<Transition>,
    distribution: Vec<f64>,
    threshold: f64,
}

impl L1OutcomeAction {
    /// Create an action with the given outcomes, base distribution, and
    /// budget.
    pub fn with_outcomes(
        outcomes: Vec<Transition>,
        distribution: Vec<f64>,
        threshold: f64,
    ) -> Result<Self> {
        let mut action = Self {
            outcomes,
            distribution: Vec::new(),
            threshold: 0.0,
        };
        action.set_distribution(distribution)?;
        action.set_threshold(threshold)?;
        Ok(action)
    }

    pub fn outcomes(&self) -> &[Transition] {
        &self.outcomes
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcome(&self, i: usize) -> Result<&Transition> {
        self.outcomes.get(i).ok_or(Error::OutOfRange {
            what: "outcome",
            index: i,
            len: self.outcomes.len(),
        })
    }

    /// Mutable outcome access, auto-extending with empty outcomes (and zero
    /// base weights) up to `i`.
    pub fn outcome_mut(&mut self, i: usize) -> &mut Transition {
        while self.outcomes.len() <= i {
            self.outcomes.push(Transition::new());
            self.distribution.push(0.0);
        }
        &mut self.outcomes[i]
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distribution
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Replace the base distribution (validated).
    pub fn set_distribution(&mut self, distribution: Vec<f64>) -> Result<()> {
        if distribution.len() != self.outcomes.len() {
            return Err(Error::ShapeMismatch {
                what: "outcome base distribution",
                expected: self.outcomes.len(),
                found: distribution.len(),
            });
        }
        if !self.outcomes.is_empty() {
            validate_distribution(&distribution, "outcome base distribution")?;
        }
        self.distribution = distribution;
        Ok(())
    }

    /// Overwrite the base weight of one outcome without validation; the
    /// builder normalizes or validates before solving.
    pub(crate) fn set_weight(&mut self, i: usize, weight: f64) {
        self.outcome_mut(i);
        self.distribution[i] = weight;
    }

    /// Make the base distribution uniform over the current outcomes.
    pub fn uniform_distribution(&mut self) {
        let n = self.outcomes.len();
        if n > 0 {
            self.distribution = vec![1.0 / n as f64; n];
        }
    }

    /// Rescale the base weights to unit mass (no-op on zero mass).
    pub fn normalize_distribution(&mut self) {
        let sum: f64 = self.distribution.iter().sum();
        if sum > 0.0 {
            for w in &mut self.distribution {
                *w /= sum;
            }
        }
    }

    /// Set the L1 budget. Finite and non-negative; values above 2 saturate.
    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::InvalidParameter {
                what: "l1 threshold",
                value: threshold,
            });
        }
        self.threshold = threshold;
        Ok(())
    }

    /// Per-outcome expected values under `value` and `discount`.
    fn outcome_values(&self, value: &[f64], discount: f64) -> Vec<f64> {
        self.outcomes
            .iter()
            .map(|o| o.expected_value(value, discount))
            .collect()
    }
}

impl ActionValue for L1OutcomeAction {
    fn value(&self, value: &[f64], discount: f64, uncertainty: Uncertainty) -> Result<BackupValue> {
        if self.outcomes.is_empty() {
            return Ok(BackupValue::plain(0.0));
        }
        let z = self.outcome_values(value, discount);
        match uncertainty {
            Uncertainty::Average => {
                let v = z
                    .iter()
                    .zip(&self.distribution)
                    .map(|(&zi, &qi)| zi * qi)
                    .sum();
                Ok(BackupValue {
                    value: v,
                    distribution: Some(self.distribution.clone()),
                })
            }
            Uncertainty::Robust => {
                let (p, v) = worstcase_l1(&z, &self.distribution, self.threshold)?;
                Ok(BackupValue {
                    value: v,
                    distribution: Some(p),
                })
            }
            Uncertainty::Optimistic => {
                let (p, v) = bestcase_l1(&z, &self.distribution, self.threshold)?;
                Ok(BackupValue {
                    value: v,
                    distribution: Some(p),
                })
            }
        }
    }

    fn value_fixed(&self, value: &[f64], discount: f64, nature: Option<&[f64]>) -> Result<f64> {
        if self.outcomes.is_empty() {
            return Ok(0.0);
        }
        let dist = nature.unwrap_or(&self.distribution);
        if dist.len() != self.outcomes.len() {
            return Err(Error::ShapeMismatch {
                what: "nature distribution",
                expected: self.outcomes.len(),
                found: dist.len(),
            });
        }
        let z = self.outcome_values(value, discount);
        Ok(z.iter().zip(dist).map(|(&zi, &pi)| zi * pi).sum())
    }

    fn validate(&self, state: usize, action: usize) -> Result<()> {
        if self.outcomes.is_empty() {
            return Ok(());
        }
        validate_distribution(&self.distribution, "outcome base distribution")?;
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::InvalidParameter {
                what: "l1 threshold",
                value: self.threshold,
            });
        }
        for outcome in &self.outcomes {
            if !outcome.is_normalized() {
                return Err(Error::NotNormalized {
                    state,
                    action,
                    sum: outcome.sum_probabilities(),
                });
            }
        }
        Ok(())
    }
}

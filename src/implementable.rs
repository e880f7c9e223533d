//! Policies constrained by observation aggregation.
//!
//! An observation mapping φ: S → O partitions states into classes; an
//! *observation policy* assigns one action per class and is admissible only
//! if that action is available in every (non-terminal) member state. Two
//! solvers search for the observation policy maximizing the
//! initial-distribution-weighted return:
//!
//! - [`ImplementableMdp::solve_reweighted`] alternates discounted occupancy
//!   of the current broadcast policy with a per-class best-common-action
//!   step.
//! - [`ImplementableMdp::solve_robust`] reduces to an observation-indexed
//!   L1-robust MDP whose outcomes are the member states (weighted by
//!   occupancy), so the adversary prices in "the worst state of the class";
//!   the robust decision policy *is* an observation policy by construction.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{
    vi_jac, vi_jac_fixed, Error, L1OutcomeAction, Mdp, Result, Rmdp, SolveConfig, Transition,
    Uncertainty,
};

/// Evaluation precision for total returns and occupancy fixpoints.
const RETURN_PRECISION: f64 = 1e-8;

/// Sweep cap backing the precision above.
const EVAL_ITERATIONS: usize = 100_000;

/// An MDP with an observation mapping and an initial distribution.
#[derive(Debug, Clone)]
pub struct ImplementableMdp {
    mdp: Mdp,
    observations: Vec<usize>,
    initial: Transition,
    classes: Vec<Vec<usize>>,
}

impl ImplementableMdp {
    /// Bundle an MDP with its state→observation map and initial distribution.
    ///
    /// `observations[s]` is the observation id of state `s`; ids are dense
    /// and 0-based. The initial distribution must be normalized over the
    /// MDP's states.
    pub fn new(mdp: Mdp, observations: Vec<usize>, initial: Transition) -> Result<Self> {
        let n = mdp.state_count();
        if observations.len() != n {
            return Err(Error::ShapeMismatch {
                what: "observation map",
                expected: n,
                found: observations.len(),
            });
        }
        // Zero-mass initial distributions are rejected outright: occupancy
        // and total-return fixpoints would silently evaluate to 0.
        if initial.sum_probabilities() <= 0.0 || !initial.is_normalized() {
            return Err(Error::InvalidDistribution {
                what: "initial distribution",
                sum: initial.sum_probabilities(),
            });
        }
        if let Some(max) = initial.max_index() {
            if max >= n {
                return Err(Error::ShapeMismatch {
                    what: "initial distribution states",
                    expected: n,
                    found: max + 1,
                });
            }
        }

        let obs_count = observations.iter().map(|&o| o + 1).max().unwrap_or(0);
        let mut classes = vec![Vec::new(); obs_count];
        for (s, &o) in observations.iter().enumerate() {
            classes[o].push(s);
        }
        Ok(Self {
            mdp,
            observations,
            initial,
            classes,
        })
    }

    pub fn mdp(&self) -> &Mdp {
        &self.mdp
    }

    pub fn observations(&self) -> &[usize] {
        &self.observations
    }

    pub fn initial(&self) -> &Transition {
        &self.initial
    }

    pub fn obs_count(&self) -> usize {
        self.classes.len()
    }

    /// States mapped to observation `o`, ascending.
    pub fn class(&self, o: usize) -> Result<&[usize]> {
        self.classes
            .get(o)
            .map(Vec::as_slice)
            .ok_or(Error::OutOfRange {
                what: "observation",
                index: o,
                len: self.classes.len(),
            })
    }

    /// Number of actions available in *every* non-terminal member of `o`
    /// (0 when the class is empty or all-terminal).
    pub fn common_action_count(&self, o: usize) -> Result<usize> {
        let mut count: Option<usize> = None;
        for &s in self.class(o)? {
            let actions = self.mdp.states()[s].action_count();
            if actions > 0 {
                count = Some(count.map_or(actions, |c| c.min(actions)));
            }
        }
        Ok(count.unwrap_or(0))
    }

    /// Broadcast an observation policy to a state policy.
    ///
    /// Terminal states broadcast to `None`; for every non-terminal state the
    /// class action must be available (admissibility).
    pub fn obs_to_state_policy(&self, obs_policy: &[usize]) -> Result<Vec<Option<usize>>> {
        if obs_policy.len() != self.obs_count() {
            return Err(Error::ShapeMismatch {
                what: "observation policy",
                expected: self.obs_count(),
                found: obs_policy.len(),
            });
        }
        let mut policy = Vec::with_capacity(self.mdp.state_count());
        for (s, &o) in self.observations.iter().enumerate() {
            let state = &self.mdp.states()[s];
            if state.is_terminal() {
                policy.push(None);
            } else {
                let a = obs_policy[o];
                if a >= state.action_count() {
                    return Err(Error::OutOfRange {
                        what: "observation policy action",
                        index: a,
                        len: state.action_count(),
                    });
                }
                policy.push(Some(a));
            }
        }
        Ok(policy)
    }

    /// Discounted state occupancy of a state policy:
    /// `d = ρ + γ·P_πᵀ·d`, iterated to [`RETURN_PRECISION`].
    pub fn occupancy(&self, policy: &[Option<usize>], discount: f64) -> Result<Vec<f64>> {
        check_strict_discount(discount)?;
        let n = self.mdp.state_count();
        if policy.len() != n {
            return Err(Error::ShapeMismatch {
                what: "policy",
                expected: n,
                found: policy.len(),
            });
        }
        let rho = self.initial.probability_vector(n)?;
        let mut occ = rho.clone();
        for _ in 0..EVAL_ITERATIONS {
            let mut next = rho.clone();
            for (s, &a) in policy.iter().enumerate() {
                let Some(a) = a else { continue };
                let t = self.mdp.transition(s, a)?;
                for (&sn, &p) in t.indices().iter().zip(t.probabilities()) {
                    next[sn] += discount * p * occ[s];
                }
            }
            let delta = occ
                .iter()
                .zip(&next)
                .map(|(&x, &y)| (x - y).abs())
                .fold(0.0, f64::max);
            occ = next;
            if delta <= RETURN_PRECISION {
                break;
            }
        }
        Ok(occ)
    }

    /// Initial-distribution-weighted return of an observation policy.
    pub fn total_return(&self, obs_policy: &[usize], discount: f64) -> Result<f64> {
        let policy = self.obs_to_state_policy(obs_policy)?;
        let cfg = SolveConfig::new(discount)
            .with_residual(RETURN_PRECISION)
            .with_iterations(EVAL_ITERATIONS);
        let sol = vi_jac_fixed(&self.mdp, &cfg, &[], &policy, &[])?;
        let rho = self.initial.probability_vector(self.mdp.state_count())?;
        Ok(rho
            .iter()
            .zip(&sol.valuefunction)
            .map(|(&p, &v)| p * v)
            .sum())
    }

    /// Reweighted method: alternate occupancy of the current broadcast
    /// policy with a per-observation best common action under
    /// occupancy-weighted Q sums. Runs exactly `iterations` rounds.
    pub fn solve_reweighted(&self, iterations: usize, discount: f64) -> Result<Vec<usize>> {
        check_strict_discount(discount)?;
        self.mdp.validate()?;
        let mut obs_policy = vec![0usize; self.obs_count()];

        for _ in 0..iterations {
            let policy = self.obs_to_state_policy(&obs_policy)?;
            let cfg = SolveConfig::new(discount)
                .with_residual(RETURN_PRECISION)
                .with_iterations(EVAL_ITERATIONS);
            let sol = vi_jac_fixed(&self.mdp, &cfg, &[], &policy, &[])?;
            let occ = self.occupancy(&policy, discount)?;

            for o in 0..self.obs_count() {
                let available = self.common_action_count(o)?;
                let mut best = 0usize;
                let mut best_q = f64::NEG_INFINITY;
                for a in 0..available {
                    let mut q = 0.0;
                    for &s in &self.classes[o] {
                        let state = &self.mdp.states()[s];
                        if !state.is_terminal() {
                            q += occ[s]
                                * state.fixed_value(&sol.valuefunction, discount, a, None)?;
                        }
                    }
                    if q > best_q {
                        best_q = q;
                        best = a;
                    }
                }
                obs_policy[o] = best;
            }
        }
        Ok(obs_policy)
    }

    /// Robust method: solve the observation-indexed L1-robust reduction,
    /// reweight by the induced occupancy, and iterate.
    ///
    /// `threshold` is the L1 budget nature spends picking among the member
    /// states of each class: 0 trusts the occupancy weights entirely, 2
    /// prices in the worst member state.
    pub fn solve_robust(
        &self,
        iterations: usize,
        threshold: f64,
        discount: f64,
    ) -> Result<Vec<usize>> {
        check_strict_discount(discount)?;
        self.mdp.validate()?;
        let mut obs_policy = vec![0usize; self.obs_count()];

        for _ in 0..iterations.max(1) {
            let policy = self.obs_to_state_policy(&obs_policy)?;
            let occ = self.occupancy(&policy, discount)?;
            let rmdp = self.robust_reduction(&occ, threshold)?;
            let cfg = SolveConfig::new(discount)
                .with_residual(RETURN_PRECISION)
                .with_iterations(EVAL_ITERATIONS);
            let sol = vi_jac(&rmdp, &cfg, &[], Uncertainty::Robust)?;
            for (o, &a) in sol.policy.iter().enumerate() {
                obs_policy[o] = a.unwrap_or(0);
            }
        }
        Ok(obs_policy)
    }

    /// The observation-indexed robust MDP: one state per observation, one
    /// outcome per non-terminal member state, base weights from `occ`
    /// (uniform when the class carries no occupancy).
    fn robust_reduction(&self, occ: &[f64], threshold: f64) -> Result<Rmdp> {
        let obs_count = self.obs_count();
        let mut rmdp = Rmdp::new();
        if obs_count > 0 {
            rmdp.ensure_state(obs_count - 1);
        }

        for o in 0..obs_count {
            let members: Vec<usize> = self.classes[o]
                .iter()
                .copied()
                .filter(|&s| !self.mdp.states()[s].is_terminal())
                .collect();
            for a in 0..self.common_action_count(o)? {
                let mut outcomes = Vec::with_capacity(members.len());
                for &s in &members {
                    let t = self.mdp.transition(s, a)?;
                    let mut projected = Transition::new();
                    for ((&sn, &p), &r) in
                        t.indices().iter().zip(t.probabilities()).zip(t.rewards())
                    {
                        projected.add_sample(self.observations[sn], p, r)?;
                    }
                    outcomes.push(projected);
                }
                let mut weights: Vec<f64> = members.iter().map(|&s| occ[s]).collect();
                let total: f64 = weights.iter().sum();
                if total > 0.0 {
                    for w in &mut weights {
                        *w /= total;
                    }
                } else if !weights.is_empty() {
                    weights = vec![1.0 / weights.len() as f64; weights.len()];
                }
                let action = L1OutcomeAction::with_outcomes(outcomes, weights, threshold)?;
                *rmdp.action_mut(o, a) = action;
            }
        }
        Ok(rmdp)
    }

    /// Write the three CSV tables (`mdp.csv`, `observations.csv`,
    /// `initial.csv`) into `dir`, optionally with header rows.
    pub fn save_csv(&self, dir: impl AsRef<Path>, headers: bool) -> std::io::Result<()> {
        let dir = dir.as_ref();

        let mut mdp_out = BufWriter::new(File::create(dir.join("mdp.csv"))?);
        if headers {
            writeln!(mdp_out, "idstatefrom,idaction,idstateto,probability,reward")?;
        }
        for (s, state) in self.mdp.states().iter().enumerate() {
            for (a, action) in state.actions().iter().enumerate() {
                let t = action.transition();
                for ((&sn, &p), &r) in t.indices().iter().zip(t.probabilities()).zip(t.rewards())
                {
                    writeln!(mdp_out, "{s},{a},{sn},{p},{r}")?;
                }
            }
        }
        mdp_out.flush()?;

        let mut obs_out = BufWriter::new(File::create(dir.join("observations.csv"))?);
        if headers {
            writeln!(obs_out, "idstate,idobservation")?;
        }
        for (s, &o) in self.observations.iter().enumerate() {
            writeln!(obs_out, "{s},{o}")?;
        }
        obs_out.flush()?;

        let mut init_out = BufWriter::new(File::create(dir.join("initial.csv"))?);
        if headers {
            writeln!(init_out, "idstate,probability")?;
        }
        for (&s, &p) in self
            .initial
            .indices()
            .iter()
            .zip(self.initial.probabilities())
        {
            writeln!(init_out, "{s},{p}")?;
        }
        init_out.flush()
    }
}

/// Discount check for this module: `[0, 1)`, deliberately stricter than the
/// solver drivers' `[0, 1]`.
///
/// The occupancy fixpoint `d = ρ + γ·P_πᵀ·d` is a geometric series that
/// diverges at γ = 1, so everything built on it (occupancy, total return,
/// both observation-policy solvers) rejects an undiscounted setting that a
/// plain fixed-horizon sweep would tolerate. See DESIGN.md, open-question
/// decision 9.
fn check_strict_discount(discount: f64) -> Result<()> {
    if !discount.is_finite() || !(0.0..1.0).contains(&discount) {
        return Err(Error::InvalidParameter {
            what: "discount",
            value: discount,
        });
    }
    Ok(())
}

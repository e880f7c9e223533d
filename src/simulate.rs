//! Seeded forward simulation and the sample log.
//!
//! The simulator borrows the MDP immutably, draws episodes under a
//! [`SimulationPolicy`], and appends `(s, a, s', r, w, step, run)` tuples to
//! a [`Samples`] store. The initial-state distribution reuses [`Transition`]
//! with state ids as indices (rewards unused).

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{validate_discount, Error, Mdp, Result, Transition};

/// One observed transition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    pub state_from: usize,
    pub action: usize,
    pub state_to: usize,
    pub reward: f64,
    pub weight: f64,
    pub step: usize,
    pub run: usize,
}

/// Append-only log of transition samples plus initial-state draws.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Samples {
    samples: Vec<Sample>,
    initial: Vec<usize>,
}

impl Samples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn add_initial(&mut self, state: usize) {
        self.initial.push(state);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn initial(&self) -> &[usize] {
        &self.initial
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Episode and termination knobs for the simulator.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Number of episodes.
    pub runs: usize,
    /// Steps per episode (an episode may end earlier).
    pub horizon: usize,
    /// Per-step termination probability.
    pub prob_term: f64,
    /// Global cap on recorded transitions across all runs.
    pub tran_limit: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            horizon: 100,
            prob_term: 0.0,
            tran_limit: None,
        }
    }
}

/// Action selection during simulation.
pub trait SimulationPolicy {
    /// Choose an action at `state` given its action count; `None` treats the
    /// state as terminal.
    fn decide(&mut self, state: usize, action_count: usize) -> Option<usize>;
}

/// Uniform-random action over the available actions, seeded.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SimulationPolicy for RandomPolicy {
    fn decide(&mut self, _state: usize, action_count: usize) -> Option<usize> {
        if action_count == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..action_count))
        }
    }
}

/// Fixed action per state.
#[derive(Debug, Clone)]
pub struct DeterministicPolicy {
    actions: Vec<usize>,
}

impl DeterministicPolicy {
    pub fn new(actions: Vec<usize>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }
}

impl SimulationPolicy for DeterministicPolicy {
    fn decide(&mut self, state: usize, action_count: usize) -> Option<usize> {
        if action_count == 0 {
            None
        } else {
            self.actions.get(state).copied()
        }
    }
}

fn validate_initial(mdp: &Mdp, initial: &Transition) -> Result<()> {
    // Unlike an ordinary transition row, an initial distribution may not
    // carry zero mass: there would be nothing to sample the first state from.
    if initial.sum_probabilities() <= 0.0 || !initial.is_normalized() {
        return Err(Error::InvalidDistribution {
            what: "initial distribution",
            sum: initial.sum_probabilities(),
        });
    }
    if let Some(max) = initial.max_index() {
        if max >= mdp.state_count() {
            return Err(Error::ShapeMismatch {
                what: "initial distribution states",
                expected: mdp.state_count(),
                found: max + 1,
            });
        }
    }
    Ok(())
}

fn draw(transition: &Transition, rng: &mut StdRng) -> Result<Option<(usize, f64)>> {
    if transition.is_empty() || transition.sum_probabilities() == 0.0 {
        return Ok(None);
    }
    let weights = WeightedIndex::new(transition.probabilities().iter().copied()).map_err(|_| {
        Error::InvalidDistribution {
            what: "transition weights",
            sum: transition.sum_probabilities(),
        }
    })?;
    let i = weights.sample(rng);
    Ok(Some((transition.indices()[i], transition.rewards()[i])))
}

/// Simulate `cfg.runs` episodes of `mdp` under `policy`.
///
/// Each step records a [`Sample`] with weight 1; each episode records its
/// initial state. Episodes end at terminal states, after `cfg.horizon`
/// steps, with probability `cfg.prob_term` per step, and the whole
/// simulation stops once `cfg.tran_limit` transitions are recorded.
pub fn simulate<P: SimulationPolicy>(
    mdp: &Mdp,
    policy: &mut P,
    initial: &Transition,
    cfg: &SimulationConfig,
    seed: u64,
) -> Result<Samples> {
    validate_initial(mdp, initial)?;
    if !cfg.prob_term.is_finite() || !(0.0..=1.0).contains(&cfg.prob_term) {
        return Err(Error::InvalidParameter {
            what: "prob_term",
            value: cfg.prob_term,
        });
    }
    mdp.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Samples::new();
    let mut transitions = 0usize;

    'runs: for run in 0..cfg.runs {
        let (mut state, _) = match draw(initial, &mut rng)? {
            Some(s) => s,
            None => break,
        };
        samples.add_initial(state);

        for step in 0..cfg.horizon {
            let action_count = mdp.action_count(state)?;
            let action = match policy.decide(state, action_count) {
                Some(a) => a,
                None => break,
            };
            if action >= action_count {
                return Err(Error::OutOfRange {
                    what: "policy action",
                    index: action,
                    len: action_count,
                });
            }
            let transition = mdp.transition(state, action)?;
            let (next, reward) = match draw(transition, &mut rng)? {
                Some(x) => x,
                None => break,
            };
            samples.add_sample(Sample {
                state_from: state,
                action,
                state_to: next,
                reward,
                weight: 1.0,
                step,
                run,
            });
            state = next;
            transitions += 1;
            if let Some(limit) = cfg.tran_limit {
                if transitions >= limit {
                    break 'runs;
                }
            }
            if cfg.prob_term > 0.0 && rng.gen_bool(cfg.prob_term) {
                break;
            }
        }
    }
    Ok(samples)
}

/// Simulate and accumulate discounted returns ∑ γᵗ·rₜ per run.
///
/// Returns the per-run initial states and returns, parallel vectors of
/// length `cfg.runs` (shorter if the transition limit cuts the simulation
/// off).
pub fn simulate_return<P: SimulationPolicy>(
    mdp: &Mdp,
    policy: &mut P,
    initial: &Transition,
    cfg: &SimulationConfig,
    discount: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<f64>)> {
    validate_discount(discount)?;
    let samples = simulate(mdp, policy, initial, cfg, seed)?;
    let states = samples.initial().to_vec();
    let mut returns = vec![0.0; states.len()];
    for s in samples.samples() {
        returns[s.run] += discount.powi(s.step as i32) * s.reward;
    }
    Ok((states, returns))
}

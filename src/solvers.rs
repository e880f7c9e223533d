//! Bellman-style solver drivers.
//!
//! Four drivers share one [`Solution`] shape:
//! - [`vi_gs`]: Gauss–Seidel value iteration, in-place ascending-state-order
//!   sweeps (order-dependent, strictly sequential).
//! - [`vi_jac`]: Jacobi value iteration, double-buffered sweeps with no
//!   inter-state dependency; `parallel` partitions the sweep across states.
//! - [`vi_jac_fixed`]: Jacobi evaluation of a fixed decision policy (and,
//!   for robust models, a fixed nature distribution per state).
//! - [`mpi_jac`]: modified policy iteration — greedy improvement sweeps
//!   interleaved with partial fixed-policy evaluation.
//!
//! The residual is the L∞ norm of the value change across one sweep. A
//! negative `maxresidual` disables early stopping entirely; reaching the
//! iteration cap is a normal return, not an error.

use rayon::prelude::*;

use crate::{
    validate_discount, validate_length, ActionValue, Error, GenericMdp, Result, State, Uncertainty,
};

/// Shared solver knobs.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolveConfig {
    /// Discount factor γ ∈ [0, 1].
    pub discount: f64,
    /// Sweep cap (default 500).
    pub iterations: usize,
    /// Early-stop tolerance: stop once the sweep residual drops to this
    /// value. Zero stops only at an exact fixed point; negative never stops
    /// early.
    pub maxresidual: f64,
    /// Partition Jacobi sweeps across states (ignored by Gauss–Seidel).
    pub parallel: bool,
}

impl SolveConfig {
    /// Config with the given discount and default iteration/residual knobs.
    pub fn new(discount: f64) -> Self {
        Self {
            discount,
            iterations: 500,
            maxresidual: 0.0,
            parallel: false,
        }
    }

    /// Same config with an early-stop tolerance.
    pub fn with_residual(mut self, maxresidual: f64) -> Self {
        self.maxresidual = maxresidual;
        self
    }

    /// Same config with a sweep cap.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    fn stop(&self, residual: f64) -> bool {
        self.maxresidual >= 0.0 && residual <= self.maxresidual
    }
}

/// Inner-loop knobs for [`mpi_jac`].
#[derive(Debug, Clone, Copy)]
pub struct MpiConfig {
    /// Partial-evaluation sweeps per outer iteration (0 degenerates to
    /// plain Jacobi value iteration).
    pub value_iterations: usize,
    /// Partial-evaluation tolerance; defaults to half the outer tolerance.
    pub value_residual: Option<f64>,
}

impl MpiConfig {
    pub fn new() -> Self {
        Self {
            value_iterations: 50,
            value_residual: None,
        }
    }
}

impl Default for MpiConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a solver returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Value per state (0 for states the iteration never touched).
    pub valuefunction: Vec<f64>,
    /// Chosen action per state; `None` for terminal states.
    pub policy: Vec<Option<usize>>,
    /// Realized worst-case outcome distribution per state (robust models);
    /// `None` for terminal states and nominal actions.
    pub natpolicy: Vec<Option<Vec<f64>>>,
    /// Residual of the last completed sweep.
    pub residual: f64,
    /// Number of completed sweeps (outer iterations for MPI).
    pub iterations: usize,
}

impl Solution {
    fn empty() -> Self {
        Self {
            valuefunction: Vec::new(),
            policy: Vec::new(),
            natpolicy: Vec::new(),
            residual: 0.0,
            iterations: 0,
        }
    }
}

fn initial_value<A: ActionValue>(mdp: &GenericMdp<A>, value0: &[f64]) -> Result<Vec<f64>> {
    validate_length(value0, mdp.state_count(), "initial value function")?;
    Ok(if value0.is_empty() {
        vec![0.0; mdp.state_count()]
    } else {
        value0.to_vec()
    })
}

fn validate_solve<A: ActionValue>(mdp: &GenericMdp<A>, cfg: &SolveConfig) -> Result<()> {
    validate_discount(cfg.discount)?;
    mdp.validate()
}

/// One greedy Jacobi sweep: per-state backups from `value`, independent
/// across states.
#[allow(clippy::type_complexity)]
fn sweep_greedy<A>(
    mdp: &GenericMdp<A>,
    value: &[f64],
    discount: f64,
    uncertainty: Uncertainty,
    parallel: bool,
) -> Result<Vec<(f64, Option<usize>, Option<Vec<f64>>)>>
where
    A: ActionValue + Sync,
{
    let backup = |state: &State<A>| -> Result<(f64, Option<usize>, Option<Vec<f64>>)> {
        let (bv, a) = state.max_value(value, discount, uncertainty)?;
        Ok((bv.value, a, bv.distribution))
    };
    if parallel {
        mdp.states().par_iter().map(backup).collect()
    } else {
        mdp.states().iter().map(backup).collect()
    }
}

/// One fixed-policy Jacobi sweep.
fn sweep_fixed<A>(
    mdp: &GenericMdp<A>,
    value: &[f64],
    discount: f64,
    policy: &[Option<usize>],
    natpolicy: &[Option<Vec<f64>>],
    parallel: bool,
) -> Result<Vec<f64>>
where
    A: ActionValue + Sync,
{
    let backup = |(s, state): (usize, &State<A>)| -> Result<f64> {
        match policy[s] {
            Some(a) => {
                let nature = natpolicy.get(s).and_then(|n| n.as_deref());
                state.fixed_value(value, discount, a, nature)
            }
            None => Ok(0.0),
        }
    };
    if parallel {
        mdp.states().par_iter().enumerate().map(backup).collect()
    } else {
        mdp.states().iter().enumerate().map(backup).collect()
    }
}

fn linf(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Value iteration with Gauss–Seidel sweeps.
///
/// Updates `V[s]` in place in ascending state order, so later states in a
/// sweep already see the sweep's earlier updates. Sequential by definition.
pub fn vi_gs<A>(
    mdp: &GenericMdp<A>,
    cfg: &SolveConfig,
    value0: &[f64],
    uncertainty: Uncertainty,
) -> Result<Solution>
where
    A: ActionValue,
{
    validate_solve(mdp, cfg)?;
    let mut value = initial_value(mdp, value0)?;
    let n = mdp.state_count();
    let mut policy = vec![None; n];
    let mut natpolicy: Vec<Option<Vec<f64>>> = vec![None; n];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    for _ in 0..cfg.iterations {
        let mut sweep_residual = 0.0_f64;
        for s in 0..n {
            let (bv, a) = mdp.states()[s].max_value(&value, cfg.discount, uncertainty)?;
            sweep_residual = sweep_residual.max((bv.value - value[s]).abs());
            value[s] = bv.value;
            policy[s] = a;
            natpolicy[s] = bv.distribution;
        }
        residual = sweep_residual;
        iterations += 1;
        if cfg.stop(residual) {
            break;
        }
    }

    Ok(Solution {
        valuefunction: value,
        policy,
        natpolicy,
        residual,
        iterations,
    })
}

/// Value iteration with Jacobi sweeps.
///
/// Each sweep reads the previous value function and writes a fresh one; with
/// `cfg.parallel` the per-state backups run on the rayon pool.
pub fn vi_jac<A>(
    mdp: &GenericMdp<A>,
    cfg: &SolveConfig,
    value0: &[f64],
    uncertainty: Uncertainty,
) -> Result<Solution>
where
    A: ActionValue + Sync,
{
    validate_solve(mdp, cfg)?;
    let mut value = initial_value(mdp, value0)?;
    let mut solution = Solution::empty();
    solution.policy = vec![None; mdp.state_count()];
    solution.natpolicy = vec![None; mdp.state_count()];
    solution.residual = f64::INFINITY;

    for _ in 0..cfg.iterations {
        let backups = sweep_greedy(mdp, &value, cfg.discount, uncertainty, cfg.parallel)?;
        let mut sweep_residual = 0.0_f64;
        for (s, (v, a, nat)) in backups.into_iter().enumerate() {
            sweep_residual = sweep_residual.max((v - value[s]).abs());
            value[s] = v;
            solution.policy[s] = a;
            solution.natpolicy[s] = nat;
        }
        solution.residual = sweep_residual;
        solution.iterations += 1;
        if cfg.stop(sweep_residual) {
            break;
        }
    }

    solution.valuefunction = value;
    Ok(solution)
}

/// Jacobi evaluation of a fixed decision policy.
///
/// `natpolicy` optionally fixes nature's outcome distribution per state (for
/// robust models); an empty slice means "use each action's base
/// distribution". No maximization happens: each sweep evaluates only the
/// chosen actions.
pub fn vi_jac_fixed<A>(
    mdp: &GenericMdp<A>,
    cfg: &SolveConfig,
    value0: &[f64],
    policy: &[Option<usize>],
    natpolicy: &[Option<Vec<f64>>],
) -> Result<Solution>
where
    A: ActionValue + Sync,
{
    validate_solve(mdp, cfg)?;
    let n = mdp.state_count();
    if policy.len() != n {
        return Err(Error::ShapeMismatch {
            what: "policy",
            expected: n,
            found: policy.len(),
        });
    }
    if !natpolicy.is_empty() && natpolicy.len() != n {
        return Err(Error::ShapeMismatch {
            what: "nature policy",
            expected: n,
            found: natpolicy.len(),
        });
    }
    for (s, &a) in policy.iter().enumerate() {
        if let Some(a) = a {
            let available = mdp.action_count(s)?;
            if a >= available {
                return Err(Error::OutOfRange {
                    what: "policy action",
                    index: a,
                    len: available,
                });
            }
        }
    }

    let mut value = initial_value(mdp, value0)?;
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    for _ in 0..cfg.iterations {
        let next = sweep_fixed(mdp, &value, cfg.discount, policy, natpolicy, cfg.parallel)?;
        residual = linf(&next, &value);
        value = next;
        iterations += 1;
        if cfg.stop(residual) {
            break;
        }
    }

    Ok(Solution {
        valuefunction: value,
        policy: policy.to_vec(),
        natpolicy: natpolicy.to_vec(),
        residual,
        iterations,
    })
}

/// Modified policy iteration with Jacobi sweeps.
///
/// Each outer iteration runs one greedy improvement sweep, then up to
/// `mpi.value_iterations` fixed-policy sweeps at the inner tolerance.
/// `progress` (if given) is called synchronously after each improvement
/// sweep with the outer iteration index and its residual.
pub fn mpi_jac<A>(
    mdp: &GenericMdp<A>,
    cfg: &SolveConfig,
    value0: &[f64],
    uncertainty: Uncertainty,
    mpi: &MpiConfig,
    progress: Option<&dyn Fn(usize, f64)>,
) -> Result<Solution>
where
    A: ActionValue + Sync,
{
    validate_solve(mdp, cfg)?;
    let mut value = initial_value(mdp, value0)?;
    let n = mdp.state_count();
    let mut policy = vec![None; n];
    let mut natpolicy: Vec<Option<Vec<f64>>> = vec![None; n];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    let inner_cfg = SolveConfig {
        maxresidual: mpi
            .value_residual
            .unwrap_or(if cfg.maxresidual >= 0.0 {
                cfg.maxresidual / 2.0
            } else {
                cfg.maxresidual
            }),
        ..*cfg
    };

    for outer in 0..cfg.iterations {
        // Policy improvement.
        let backups = sweep_greedy(mdp, &value, cfg.discount, uncertainty, cfg.parallel)?;
        let mut sweep_residual = 0.0_f64;
        for (s, (v, a, nat)) in backups.into_iter().enumerate() {
            sweep_residual = sweep_residual.max((v - value[s]).abs());
            value[s] = v;
            policy[s] = a;
            natpolicy[s] = nat;
        }
        residual = sweep_residual;
        iterations = outer + 1;
        if let Some(cb) = progress {
            cb(outer, residual);
        }
        if cfg.stop(residual) {
            break;
        }

        // Partial evaluation of the improved policy.
        for _ in 0..mpi.value_iterations {
            let next = sweep_fixed(
                mdp,
                &value,
                cfg.discount,
                &policy,
                &natpolicy,
                cfg.parallel,
            )?;
            let inner_residual = linf(&next, &value);
            value = next;
            if inner_cfg.stop(inner_residual) {
                break;
            }
        }
    }

    Ok(Solution {
        valuefunction: value,
        policy,
        natpolicy,
        residual,
        iterations,
    })
}

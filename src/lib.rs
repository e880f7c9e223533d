//! `rmdp`: finite discrete Markov Decision Processes, exactly solved.
//!
//! This crate is designed for "small but serious" tabular decision problems:
//! you have a sparse MDP (built directly, estimated from samples, or ingested
//! from dense matrices), you solve it exactly, and you optionally robustify it
//! against transition-model error.
//!
//! Goals:
//! - **Deterministic by default**: seeded simulation, stable tie-breaking,
//!   same inputs → same value function and policy.
//! - **Sparse inner loops**: transitions are parallel index/probability/reward
//!   vectors in ascending index order; backups never touch zero entries.
//! - **Robustness as a first-class variant**: an [`Rmdp`] carries, per
//!   (state, action), a set of outcomes and a base distribution the adversary
//!   may perturb within an L1 ball.
//!
//! Included solvers:
//! - [`vi_gs`]: value iteration with in-place Gauss–Seidel sweeps.
//! - [`vi_jac`]: value iteration with double-buffered Jacobi sweeps
//!   (optionally parallel across states).
//! - [`vi_jac_fixed`]: fixed-policy Jacobi evaluation, with an optional
//!   "nature" distribution per state for robust models.
//! - [`mpi_jac`]: modified policy iteration (greedy improvement + partial
//!   Jacobi evaluation), with an optional progress callback.
//!
//! Around the solvers:
//! - [`simulate`] / [`simulate_return`]: seeded forward simulation under
//!   random or deterministic policies, producing a [`Samples`] log.
//! - [`SampledMdp`]: incremental maximum-likelihood MDP estimation from
//!   weighted samples.
//! - [`robustify`]: nominal MDP → L1-robust MDP with per-next-state outcomes.
//! - [`ImplementableMdp`]: policies constrained to be constant on observation
//!   classes, solved by occupancy reweighting or via a robust reduction.
//!
//! Non-goals:
//! - No continuous state/action spaces, no function approximation, and no
//!   stochastic-approximation learning: models are estimated empirically and
//!   then solved exactly.
//! - No uncertainty sets beyond the L1 ball, and no undiscounted
//!   infinite-horizon solving.

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod transition;
pub use transition::*;

mod action;
pub use action::*;

mod worstcase;
pub use worstcase::*;

mod mdp;
pub use mdp::*;

mod solvers;
pub use solvers::*;

mod matrices;
pub use matrices::*;

mod robustify;
pub use robustify::*;

mod simulate;
pub use simulate::*;

mod sampled;
pub use sampled::*;

mod implementable;
pub use implementable::*;

#[cfg(feature = "serde")]
mod output;

pub const RMDP_VERSION: &str = env!("CARGO_PKG_VERSION");

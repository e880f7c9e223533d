//! Cross-solver invariants: contraction, solver agreement, Gauss–Seidel vs.
//! Jacobi progress, robustness monotonicity, and ingestion normalization.

use ndarray::{arr2, Array3};
use rmdp::{
    mpi_jac, robustify, vi_gs, vi_jac, vi_jac_fixed, Mdp, MpiConfig, SolveConfig, Uncertainty,
    DEFAULT_IGNORE_THRESHOLD,
};

/// A five-state, two-action MDP with genuinely stochastic rows.
fn reference_mdp() -> Mdp {
    let mut mdp = Mdp::new();
    for s in 0..5usize {
        let a_next = (s + 1) % 5;
        let b_next = (s + 3) % 5;
        // Action 0: mostly advance, slight stay; reward grows with the state.
        mdp.add_transition(s, 0, a_next, 0.8, s as f64 * 0.5).unwrap();
        mdp.add_transition(s, 0, s, 0.2, 0.1).unwrap();
        // Action 1: long jump with a spread.
        mdp.add_transition(s, 1, b_next, 0.6, 1.0).unwrap();
        mdp.add_transition(s, 1, (s + 4) % 5, 0.4, 0.0).unwrap();
    }
    mdp
}

fn one_sweep(discount: f64) -> SolveConfig {
    SolveConfig::new(discount)
        .with_residual(-1.0)
        .with_iterations(1)
}

#[test]
fn jacobi_sweeps_contract_at_rate_gamma() {
    let mdp = reference_mdp();
    let discount = 0.9;
    let mut value: Vec<f64> = Vec::new();
    let mut residuals = Vec::new();
    for _ in 0..30 {
        let sol = vi_jac(&mdp, &one_sweep(discount), &value, Uncertainty::Average).unwrap();
        residuals.push(sol.residual);
        value = sol.valuefunction;
    }
    for pair in residuals.windows(2).skip(1) {
        assert!(
            pair[1] <= discount * pair[0] + 1e-12,
            "sweep residual {} exceeded γ·{}",
            pair[1],
            pair[0]
        );
    }
}

#[test]
fn vi_mpi_and_fixed_point_agree() {
    let mdp = reference_mdp();
    let cfg = SolveConfig::new(0.9)
        .with_residual(1e-9)
        .with_iterations(10_000);
    let vi = vi_jac(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
    let mpi = mpi_jac(&mdp, &cfg, &[], Uncertainty::Average, &MpiConfig::new(), None).unwrap();
    let fixed = vi_jac_fixed(&mdp, &cfg, &[], &vi.policy, &[]).unwrap();
    for s in 0..5 {
        assert!((vi.valuefunction[s] - mpi.valuefunction[s]).abs() < 1e-6);
        assert!((vi.valuefunction[s] - fixed.valuefunction[s]).abs() < 1e-6);
    }
    assert_eq!(vi.policy, mpi.policy);
}

#[test]
fn gauss_seidel_makes_at_least_jacobi_progress() {
    // Distance to the fixed point after k sweeps: with non-negative rewards
    // and V₀ = 0 the iterates climb monotonically, and in-place sweeps see
    // the newer (larger) values first, so Gauss–Seidel dominates pointwise.
    let mdp = reference_mdp();
    let reference = vi_jac(
        &mdp,
        &SolveConfig::new(0.9)
            .with_residual(1e-12)
            .with_iterations(100_000),
        &[],
        Uncertainty::Average,
    )
    .unwrap();
    for sweeps in [1usize, 2, 3, 5, 8] {
        let cfg = SolveConfig::new(0.9)
            .with_residual(-1.0)
            .with_iterations(sweeps);
        let gs = vi_gs(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
        let jac = vi_jac(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
        let gs_gap = distance(&gs.valuefunction, &reference.valuefunction);
        let jac_gap = distance(&jac.valuefunction, &reference.valuefunction);
        assert!(
            gs_gap <= jac_gap + 1e-9,
            "after {sweeps} sweeps: GS gap {gs_gap} vs Jacobi {jac_gap}"
        );
    }
}

#[test]
fn gauss_seidel_residual_never_trails_jacobi_on_the_toggle() {
    let mut mdp = Mdp::new();
    mdp.add_transition(0, 0, 0, 1.0, 1.0).unwrap();
    mdp.add_transition(0, 1, 1, 1.0, 0.0).unwrap();
    mdp.add_transition(1, 0, 1, 1.0, 0.0).unwrap();
    mdp.add_transition(1, 1, 0, 1.0, 0.0).unwrap();
    for sweeps in 1..10usize {
        let cfg = SolveConfig::new(0.9)
            .with_residual(-1.0)
            .with_iterations(sweeps);
        let gs = vi_gs(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
        let jac = vi_jac(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
        assert!(gs.residual <= jac.residual + 1e-12);
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn robust_value_is_monotone_in_the_threshold() {
    let mdp = reference_mdp();
    let mut rmdp = robustify(&mdp, false);
    let cfg = SolveConfig::new(0.9)
        .with_residual(1e-9)
        .with_iterations(10_000);

    let mut previous_robust = f64::INFINITY;
    let mut previous_optimistic = f64::NEG_INFINITY;
    for t in [0.0, 0.25, 0.5, 1.0, 2.0] {
        rmdp.set_uniform_thresholds(t).unwrap();
        let robust = vi_jac(&rmdp, &cfg, &[], Uncertainty::Robust).unwrap();
        let optimistic = vi_jac(&rmdp, &cfg, &[], Uncertainty::Optimistic).unwrap();
        assert!(
            robust.valuefunction[0] <= previous_robust + 1e-7,
            "robust value rose with the budget at t = {t}"
        );
        assert!(
            optimistic.valuefunction[0] >= previous_optimistic - 1e-7,
            "optimistic value fell with the budget at t = {t}"
        );
        previous_robust = robust.valuefunction[0];
        previous_optimistic = optimistic.valuefunction[0];
    }
}

#[test]
fn average_mode_reduces_to_the_nominal_solve() {
    let mdp = reference_mdp();
    let mut rmdp = robustify(&mdp, true);
    // Thresholds are irrelevant under Average.
    rmdp.set_uniform_thresholds(1.7).unwrap();
    let cfg = SolveConfig::new(0.9)
        .with_residual(1e-10)
        .with_iterations(10_000);
    let nominal = vi_jac(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
    let averaged = vi_jac(&rmdp, &cfg, &[], Uncertainty::Average).unwrap();
    for (a, b) in nominal.valuefunction.iter().zip(&averaged.valuefunction) {
        assert!((a - b).abs() < 1e-8);
    }
    assert_eq!(nominal.policy, averaged.policy);
}

#[test]
fn robustified_zero_threshold_solves_like_nominal() {
    let mdp = reference_mdp();
    let rmdp = robustify(&mdp, true);
    let cfg = SolveConfig::new(0.9)
        .with_residual(1e-10)
        .with_iterations(10_000);
    let nominal = vi_jac(&mdp, &cfg, &[], Uncertainty::Average).unwrap();
    let robust = vi_jac(&rmdp, &cfg, &[], Uncertainty::Robust).unwrap();
    for (a, b) in nominal.valuefunction.iter().zip(&robust.valuefunction) {
        assert!((a - b).abs() < 1e-8);
    }
    assert_eq!(nominal.policy, robust.policy);
}

#[test]
fn ingestion_normalizes_every_row() {
    let mut t = Array3::zeros((3, 3, 2));
    // Action 0: a noisy cycle; action 1: lazy self-loops.
    t[[0, 1, 0]] = 0.7;
    t[[0, 2, 0]] = 0.3;
    t[[1, 2, 0]] = 1.0;
    t[[2, 0, 0]] = 1.0;
    t[[0, 0, 1]] = 1.0;
    t[[1, 1, 1]] = 1.0;
    t[[2, 2, 1]] = 1.0 - 1e-12;
    t[[2, 1, 1]] = 1e-12; // below the ignore threshold, dropped on ingestion
    let r = arr2(&[[1.0, 0.0], [0.5, 0.0], [0.0, 0.0]]);
    let mdp = Mdp::from_matrices(&t, &r, DEFAULT_IGNORE_THRESHOLD).unwrap();

    for s in 0..3 {
        for a in 0..2 {
            let row = mdp.transition(s, a).unwrap();
            let sum = row.sum_probabilities();
            assert!(
                sum == 0.0 || (sum - 1.0).abs() < 1e-9,
                "row ({s},{a}) sums to {sum}"
            );
            assert!(row.indices().windows(2).all(|w| w[0] < w[1]));
            assert!(row.probabilities().iter().all(|&p| p >= 0.0));
        }
    }
}

//! Statistical checks: simulated returns against analytic values, and the
//! sample-based estimator against the generating model. Seeds are fixed, so
//! the bands below are generous but deterministic.

use rmdp::{
    simulate, simulate_return, vi_jac, vi_jac_fixed, DeterministicPolicy, Mdp, RandomPolicy,
    SampledMdp, SimulationConfig, SolveConfig, Transition, Uncertainty,
};

/// Two states: the action either keeps paying (p = 0.5, reward 1) or drops
/// into a terminal state that ends the episode.
fn decaying_mdp() -> Mdp {
    let mut mdp = Mdp::new();
    mdp.add_transition(0, 0, 0, 0.5, 1.0).unwrap();
    mdp.add_transition(0, 0, 1, 0.5, 0.0).unwrap();
    mdp
}

/// Five states, two actions, stochastic rows with known probabilities.
fn five_state_mdp() -> Mdp {
    let mut mdp = Mdp::new();
    for s in 0..5usize {
        mdp.add_transition(s, 0, (s + 1) % 5, 0.7, 1.0).unwrap();
        mdp.add_transition(s, 0, s, 0.3, 0.0).unwrap();
        mdp.add_transition(s, 1, (s + 2) % 5, 0.4, 0.5).unwrap();
        mdp.add_transition(s, 1, (s + 4) % 5, 0.6, -0.2).unwrap();
    }
    mdp
}

#[test]
fn empirical_mean_return_approaches_the_analytic_value() {
    let mdp = decaying_mdp();
    let discount = 0.9;
    // V^π(0) = 0.5·(1 + γ·V^π(0)) ⇒ V^π(0) = 0.5 / (1 − 0.45).
    let analytic = 0.5 / (1.0 - 0.45);

    let initial = Transition::deterministic(0, 0.0);
    let cfg = SimulationConfig {
        runs: 20_000,
        horizon: 200,
        ..Default::default()
    };
    let mut policy = DeterministicPolicy::new(vec![0, 0]);
    let (states, returns) =
        simulate_return(&mdp, &mut policy, &initial, &cfg, discount, 1234).unwrap();

    assert_eq!(states.len(), 20_000);
    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    // Per-run returns are bounded by 1/(1−γ); 20k runs put the standard
    // error well under the band below.
    assert!(
        (mean - analytic).abs() < 0.05,
        "empirical {mean} vs analytic {analytic}"
    );
}

#[test]
fn empirical_mean_matches_fixed_policy_evaluation() {
    let mdp = decaying_mdp();
    let discount = 0.9;
    let eval = vi_jac_fixed(
        &mdp,
        &SolveConfig::new(discount)
            .with_residual(1e-10)
            .with_iterations(10_000),
        &[],
        &[Some(0), None],
        &[],
    )
    .unwrap();

    let initial = Transition::deterministic(0, 0.0);
    let cfg = SimulationConfig {
        runs: 20_000,
        horizon: 200,
        ..Default::default()
    };
    let mut policy = DeterministicPolicy::new(vec![0, 0]);
    let (_, returns) =
        simulate_return(&mdp, &mut policy, &initial, &cfg, discount, 99).unwrap();
    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    assert!((mean - eval.valuefunction[0]).abs() < 0.05);
}

#[test]
fn estimator_recovers_transition_probabilities() {
    let mdp = five_state_mdp();
    let mut initial = Transition::new();
    for s in 0..5 {
        initial.add_sample(s, 0.2, 0.0).unwrap();
    }
    let cfg = SimulationConfig {
        runs: 2_000,
        horizon: 100,
        tran_limit: Some(100_000),
        ..Default::default()
    };
    let mut policy = RandomPolicy::with_seed(7);
    let samples = simulate(&mdp, &mut policy, &initial, &cfg, 7).unwrap();
    assert_eq!(samples.len(), 100_000);

    let mut estimator = SampledMdp::new();
    estimator.add_samples(&samples).unwrap();
    let estimate = estimator.mdp();
    assert!(estimate.validate().is_ok());

    // ~10k draws per (s, a) put every empirical frequency within a few
    // standard errors of the truth.
    for s in 0..5 {
        for a in 0..2 {
            let truth = mdp.transition(s, a).unwrap();
            let learned = estimate.transition(s, a).unwrap();
            for (&next, &p) in truth.indices().iter().zip(truth.probabilities()) {
                let q = learned.probability_of(next);
                assert!(
                    (p - q).abs() < 0.025,
                    "({s},{a})→{next}: true {p}, learned {q}"
                );
            }
        }
    }
}

#[test]
fn estimator_solution_approaches_the_true_optimum() {
    let mdp = five_state_mdp();
    let mut initial = Transition::new();
    for s in 0..5 {
        initial.add_sample(s, 0.2, 0.0).unwrap();
    }
    let cfg = SimulationConfig {
        runs: 2_000,
        horizon: 100,
        tran_limit: Some(100_000),
        ..Default::default()
    };
    let mut policy = RandomPolicy::with_seed(21);
    let samples = simulate(&mdp, &mut policy, &initial, &cfg, 21).unwrap();
    let mut estimator = SampledMdp::new();
    estimator.add_samples(&samples).unwrap();

    let solve = SolveConfig::new(0.9)
        .with_residual(1e-9)
        .with_iterations(10_000);
    let truth = vi_jac(&mdp, &solve, &[], Uncertainty::Average).unwrap();
    let learned = vi_jac(&estimator.mdp(), &solve, &[], Uncertainty::Average).unwrap();
    for s in 0..5 {
        assert!(
            (truth.valuefunction[s] - learned.valuefunction[s]).abs() < 0.3,
            "state {s}: true {} vs learned {}",
            truth.valuefunction[s],
            learned.valuefunction[s]
        );
    }
}

#[test]
fn estimator_recovers_the_initial_distribution() {
    let mdp = five_state_mdp();
    let mut initial = Transition::new();
    initial.add_sample(0, 0.5, 0.0).unwrap();
    initial.add_sample(3, 0.5, 0.0).unwrap();
    let cfg = SimulationConfig {
        runs: 5_000,
        horizon: 2,
        ..Default::default()
    };
    let mut policy = RandomPolicy::with_seed(3);
    let samples = simulate(&mdp, &mut policy, &initial, &cfg, 3).unwrap();

    let mut estimator = SampledMdp::new();
    estimator.add_samples(&samples).unwrap();
    let learned = estimator.initial_distribution();
    assert!(learned.is_normalized());
    assert!((learned.probability_of(0) - 0.5).abs() < 0.03);
    assert!((learned.probability_of(3) - 0.5).abs() < 0.03);
    assert_eq!(learned.probability_of(1), 0.0);
}

//! Nominal → L1-robust transformation.
//!
//! Each `(s, a)` of the nominal model becomes an [`crate::L1OutcomeAction`]
//! whose outcomes are deterministic transitions to individual next states.
//! The adversary then redistributes mass *between next states* within the L1
//! ball — with `allow_zeros`, even onto states the nominal model never
//! reaches. Thresholds start at 0, so a freshly robustified model solves
//! exactly like the nominal one until the caller raises them.

use crate::{L1OutcomeAction, Mdp, Rmdp, Transition};

/// Convert a nominal MDP into an L1-robust MDP with one outcome per next
/// state.
///
/// With `allow_zeros`, every state of the MDP becomes an outcome of every
/// `(s, a)` (base weight 0 off the nominal support), so raising a threshold
/// lets the adversary move mass anywhere. Without it, outcomes cover only
/// the nominal support.
pub fn robustify(mdp: &Mdp, allow_zeros: bool) -> Rmdp {
    let n = mdp.state_count();
    let mut rmdp = Rmdp::new();
    if n > 0 {
        rmdp.ensure_state(n - 1);
    }

    for (s, state) in mdp.states().iter().enumerate() {
        for (a, action) in state.actions().iter().enumerate() {
            let t = action.transition();
            let robust = if allow_zeros {
                let outcomes = (0..n)
                    .map(|k| Transition::deterministic(k, t.reward_of(k)))
                    .collect();
                let weights = (0..n).map(|k| t.probability_of(k)).collect();
                build_action(outcomes, weights)
            } else {
                let outcomes = t
                    .indices()
                    .iter()
                    .zip(t.rewards())
                    .map(|(&k, &r)| Transition::deterministic(k, r))
                    .collect();
                build_action(outcomes, t.probabilities().to_vec())
            };
            *rmdp.action_mut(s, a) = robust;
        }
    }
    rmdp
}

fn build_action(outcomes: Vec<Transition>, weights: Vec<f64>) -> L1OutcomeAction {
    let mut action = L1OutcomeAction::default();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        *action.outcome_mut(i) = outcome;
    }
    for (i, w) in weights.into_iter().enumerate() {
        action.set_weight(i, w);
    }
    action
}

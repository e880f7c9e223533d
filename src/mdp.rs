//! States and the MDP/RMDP containers.
//!
//! Identifiers are dense 0-based positions: state id = index into
//! [`GenericMdp::states`], action id = index into [`State::actions`], and for
//! robust models outcome id = index into the action's outcome vector. Builder
//! calls auto-extend containers with empty slots when an identifier beyond
//! the current end is written; reads never auto-extend.

use crate::{ActionValue, BackupValue, Error, L1OutcomeAction, RegularAction, Result, Uncertainty};

/// An ordered container of actions; a state with no actions is terminal.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State<A> {
    actions: Vec<A>,
}

impl<A> State<A> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Terminal states take no actions and back up to value 0.
    pub fn is_terminal(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action(&self, a: usize) -> Result<&A> {
        self.actions.get(a).ok_or(Error::OutOfRange {
            what: "action",
            index: a,
            len: self.actions.len(),
        })
    }
}

impl<A: Default> State<A> {
    /// Mutable action access, auto-extending with empty actions up to `a`.
    pub fn action_mut(&mut self, a: usize) -> &mut A {
        while self.actions.len() <= a {
            self.actions.push(A::default());
        }
        &mut self.actions[a]
    }
}

impl<A: ActionValue> State<A> {
    /// Greedy backup: the best action's value and id under `uncertainty`.
    ///
    /// Ties go to the lowest action id; terminal states yield value 0 and no
    /// action.
    pub fn max_value(
        &self,
        value: &[f64],
        discount: f64,
        uncertainty: Uncertainty,
    ) -> Result<(BackupValue, Option<usize>)> {
        let mut best: Option<(BackupValue, usize)> = None;
        for (a, action) in self.actions.iter().enumerate() {
            let bv = action.value(value, discount, uncertainty)?;
            match &best {
                Some((current, _)) if bv.value <= current.value => {}
                _ => best = Some((bv, a)),
            }
        }
        Ok(match best {
            Some((bv, a)) => (bv, Some(a)),
            None => (BackupValue::plain(0.0), None),
        })
    }

    /// Backup of one chosen action under a fixed nature distribution.
    pub fn fixed_value(
        &self,
        value: &[f64],
        discount: f64,
        action: usize,
        nature: Option<&[f64]>,
    ) -> Result<f64> {
        self.action(action)?.value_fixed(value, discount, nature)
    }
}

/// An ordered container of states, generic over the action representation.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericMdp<A> {
    states: Vec<State<A>>,
}

/// A nominal MDP.
pub type Mdp = GenericMdp<RegularAction>;

/// An L1-robust MDP.
pub type Rmdp = GenericMdp<L1OutcomeAction>;

impl<A> GenericMdp<A> {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn states(&self) -> &[State<A>] {
        &self.states
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, s: usize) -> Result<&State<A>> {
        self.states.get(s).ok_or(Error::OutOfRange {
            what: "state",
            index: s,
            len: self.states.len(),
        })
    }

    pub fn action_count(&self, s: usize) -> Result<usize> {
        Ok(self.state(s)?.action_count())
    }

    /// Whether every state has the same number of actions (required by the
    /// dense-matrix extraction).
    pub fn is_uniform(&self) -> bool {
        match self.states.first() {
            None => true,
            Some(first) => {
                let n = first.action_count();
                self.states.iter().all(|s| s.action_count() == n)
            }
        }
    }
}

impl<A: Default> GenericMdp<A> {
    /// Extend the state container so that state `s` exists.
    pub fn ensure_state(&mut self, s: usize) -> &mut State<A> {
        while self.states.len() <= s {
            self.states.push(State::new());
        }
        &mut self.states[s]
    }

    /// Mutable action access, auto-extending states and actions.
    pub fn action_mut(&mut self, s: usize, a: usize) -> &mut A {
        self.ensure_state(s).action_mut(a)
    }
}

impl<A: ActionValue> GenericMdp<A> {
    /// Validate every action before a solve (normalization, distributions,
    /// thresholds). Solvers call this before the first sweep.
    pub fn validate(&self) -> Result<()> {
        for (s, state) in self.states.iter().enumerate() {
            for (a, action) in state.actions().iter().enumerate() {
                action.validate(s, a)?;
            }
        }
        Ok(())
    }
}

impl Mdp {
    /// Add (or merge) a transition `(from, action) → to` with the given
    /// probability and reward, auto-extending states and actions.
    ///
    /// Both `from` and `to` are guaranteed to exist afterwards.
    pub fn add_transition(
        &mut self,
        from: usize,
        action: usize,
        to: usize,
        probability: f64,
        reward: f64,
    ) -> Result<()> {
        self.action_mut(from, action)
            .transition_mut()
            .add_sample(to, probability, reward)?;
        self.ensure_state(to);
        Ok(())
    }

    /// The sparse transition row of `(s, a)`.
    pub fn transition(&self, s: usize, a: usize) -> Result<&crate::Transition> {
        Ok(self.state(s)?.action(a)?.transition())
    }

    /// Number of stored transition samples of `(s, a)`.
    pub fn transition_count(&self, s: usize, a: usize) -> Result<usize> {
        Ok(self.transition(s, a)?.len())
    }

    /// Overwrite the reward of the `i`-th transition sample of `(s, a)`.
    pub fn set_reward(&mut self, s: usize, a: usize, i: usize, reward: f64) -> Result<()> {
        let len = self.states.len();
        let state = self.states.get_mut(s).ok_or(Error::OutOfRange {
            what: "state",
            index: s,
            len,
        })?;
        let actions = state.action_count();
        let action = state.actions.get_mut(a).ok_or(Error::OutOfRange {
            what: "action",
            index: a,
            len: actions,
        })?;
        action.transition_mut().set_reward(i, reward)
    }

    /// Normalize every transition row in place.
    pub fn normalize(&mut self) {
        for state in &mut self.states {
            for action in &mut state.actions {
                action.transition_mut().normalize();
            }
        }
    }
}

impl Rmdp {
    /// Add (or merge) a transition into outcome `outcome` of `(from, action)`,
    /// auto-extending states, actions, and outcomes.
    ///
    /// New outcomes join the base distribution with weight 0; set the
    /// distribution (or call [`L1OutcomeAction::uniform_distribution`] /
    /// [`L1OutcomeAction::normalize_distribution`]) before solving.
    pub fn add_transition(
        &mut self,
        from: usize,
        action: usize,
        outcome: usize,
        to: usize,
        probability: f64,
        reward: f64,
    ) -> Result<()> {
        self.action_mut(from, action)
            .outcome_mut(outcome)
            .add_sample(to, probability, reward)?;
        self.ensure_state(to);
        Ok(())
    }

    /// The transition row of outcome `o` of `(s, a)`.
    pub fn outcome_transition(&self, s: usize, a: usize, o: usize) -> Result<&crate::Transition> {
        self.state(s)?.action(a)?.outcome(o)
    }

    /// Overwrite the reward of the `i`-th transition sample of outcome `o`
    /// of `(s, a)`.
    pub fn set_reward(
        &mut self,
        s: usize,
        a: usize,
        o: usize,
        i: usize,
        reward: f64,
    ) -> Result<()> {
        let len = self.states.len();
        let state = self.states.get_mut(s).ok_or(Error::OutOfRange {
            what: "state",
            index: s,
            len,
        })?;
        let actions = state.action_count();
        let action = state.actions.get_mut(a).ok_or(Error::OutOfRange {
            what: "action",
            index: a,
            len: actions,
        })?;
        let outcomes = action.outcome_count();
        if o >= outcomes {
            return Err(Error::OutOfRange {
                what: "outcome",
                index: o,
                len: outcomes,
            });
        }
        action.outcome_mut(o).set_reward(i, reward)
    }

    /// Set the L1 budget of one `(s, a)`.
    pub fn set_threshold(&mut self, s: usize, a: usize, threshold: f64) -> Result<()> {
        let len = self.states.len();
        let state = self.states.get_mut(s).ok_or(Error::OutOfRange {
            what: "state",
            index: s,
            len,
        })?;
        let actions = state.action_count();
        let action = state.actions.get_mut(a).ok_or(Error::OutOfRange {
            what: "action",
            index: a,
            len: actions,
        })?;
        action.set_threshold(threshold)
    }

    /// Set the same L1 budget everywhere.
    pub fn set_uniform_thresholds(&mut self, threshold: f64) -> Result<()> {
        for state in &mut self.states {
            for action in &mut state.actions {
                action.set_threshold(threshold)?;
            }
        }
        Ok(())
    }

    /// Replace the base distribution of one `(s, a)`.
    pub fn set_distribution(&mut self, s: usize, a: usize, distribution: Vec<f64>) -> Result<()> {
        let len = self.states.len();
        let state = self.states.get_mut(s).ok_or(Error::OutOfRange {
            what: "state",
            index: s,
            len,
        })?;
        let actions = state.action_count();
        let action = state.actions.get_mut(a).ok_or(Error::OutOfRange {
            what: "action",
            index: a,
            len: actions,
        })?;
        action.set_distribution(distribution)
    }
}

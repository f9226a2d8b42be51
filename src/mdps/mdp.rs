use crate::common::defs::Continous;
use std::fmt::Debug;
use std::hash::Hash;

/// Markov Decision Process - Sutton & Barto 2018.
///
/// Rewards depend on the state alone: `reward(s)` is collected on every
/// visit to `s`, terminal states included.
pub trait Mdp {
    type State: Clone + Eq + Hash + Debug;

    type Action: Clone + PartialEq + Debug;

    /// Every state of the model. The order must be the same on every call.
    fn states(&self) -> Vec<Self::State>;

    /// Legal actions of `s` in tie-break order. Empty for terminal states.
    fn possible_actions(&self, s: &Self::State) -> Vec<Self::Action>;

    fn transition_states_and_probs(
        &self,
        s: &Self::State,
        a: &Self::Action,
    ) -> Vec<(Self::State, Continous)>;

    fn reward(&self, s: &Self::State) -> Continous;

    fn is_terminal(&self, s: &Self::State) -> bool;
}

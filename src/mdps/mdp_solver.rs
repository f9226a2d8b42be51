use super::mdp::Mdp;
use crate::{common::defs::Continous, error::Result};

/// Read side of a solved MDP: values, Q-values and the greedy policy.
pub trait ValueEstimationAgent<M: Mdp> {
    fn get_value(&self, s: &M::State) -> Result<Continous>;

    fn get_q_value(&self, s: &M::State, a: &M::Action) -> Result<Continous>;

    /// `None` exactly for terminal states.
    fn get_policy(&self, s: &M::State) -> Result<Option<M::Action>>;

    fn get_action(&self, s: &M::State) -> Result<Option<M::Action>> {
        self.get_policy(s)
    }
}

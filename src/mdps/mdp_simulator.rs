use super::{mdp::Mdp, mdp_solver::ValueEstimationAgent};
use crate::{
    common::defs::Continous,
    error::{MdpError, Result},
};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::Serialize;

pub trait Weighted<S> {
    fn s(&self) -> S;

    fn p(&self) -> Continous;
}

impl<S: Clone> Weighted<S> for (S, Continous) {
    fn s(&self) -> S {
        self.0.clone()
    }

    fn p(&self) -> Continous {
        self.1
    }
}

pub fn pick_next<T, S>(rng: &mut StdRng, ts: &[T]) -> Result<S>
where
    T: Weighted<S>,
{
    let dist = WeightedIndex::new(ts.iter().map(|item| item.p()))
        .map_err(|e| MdpError::InvalidModel(format!("cannot sample next state: {e}")))?;
    Ok(ts[dist.sample(rng)].s())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpisodeStep<S, A> {
    pub state: S,
    pub action: Option<A>,
    pub reward: Continous,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Episode<S, A> {
    pub steps: Vec<EpisodeStep<S, A>>,
    /// Whether the episode reached a terminal state within the step budget.
    pub terminated: bool,
}

impl<S, A> Episode<S, A> {
    pub fn total_reward(&self) -> Continous {
        self.steps.iter().map(|x| x.reward).sum()
    }

    pub fn discounted_return(&self, gamma: Continous) -> Continous {
        self.steps
            .iter()
            .rev()
            .fold(0., |g: Continous, x| x.reward + gamma * g)
    }
}

/// Rolls out episodes of an agent's policy on a known model.
pub struct MdpSimulator<'a, M: Mdp> {
    mdp: &'a M,
    rng: StdRng,
}

impl<'a, M: Mdp> MdpSimulator<'a, M> {
    pub fn new(mdp: &'a M, seed: u64) -> Self {
        Self {
            mdp,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Collects `reward(s)` for every visited state, terminal state included.
    pub fn run_episode<P>(
        &mut self,
        agent: &P,
        start: M::State,
        max_steps: usize,
    ) -> Result<Episode<M::State, M::Action>>
    where
        P: ValueEstimationAgent<M>,
    {
        let mut steps = Vec::new();
        let mut s = start;
        for _ in 0..max_steps {
            let reward = self.mdp.reward(&s);
            if self.mdp.is_terminal(&s) {
                steps.push(EpisodeStep {
                    state: s,
                    action: None,
                    reward,
                });
                return Ok(Episode {
                    steps,
                    terminated: true,
                });
            }

            let a = agent
                .get_action(&s)?
                .ok_or_else(|| MdpError::NoLegalAction(format!("{s:?}")))?;
            let next = pick_next(&mut self.rng, &self.mdp.transition_states_and_probs(&s, &a))?;
            steps.push(EpisodeStep {
                state: s,
                action: Some(a),
                reward,
            });
            s = next;
        }

        Ok(Episode {
            steps,
            terminated: false,
        })
    }

    pub fn run_episodes<P>(
        &mut self,
        agent: &P,
        start: M::State,
        n: usize,
        max_steps: usize,
    ) -> Result<Vec<Episode<M::State, M::Action>>>
    where
        P: ValueEstimationAgent<M>,
    {
        (0..n)
            .map(|_| self.run_episode(agent, start.clone(), max_steps))
            .collect()
    }
}

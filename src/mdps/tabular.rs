use super::mdp::Mdp;
use crate::{
    common::defs::{Continous, PROBABILITY_TOLERANCE},
    error::{MdpError, Result},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::{fs, path::Path};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome<S> {
    pub next_state: S,
    pub probability: Continous,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord<S, A> {
    pub action: A,
    pub outcomes: Vec<Outcome<S>>,
}

/// One state of a [`TabularMdp`] with its reward and outgoing actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>, A: Deserialize<'de>"))]
pub struct StateRecord<S, A> {
    pub state: S,
    #[serde(default)]
    pub reward: Continous,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub actions: Vec<ActionRecord<S, A>>,
}

impl<S, A> StateRecord<S, A> {
    pub fn new(state: S, reward: Continous) -> Self {
        Self {
            state,
            reward,
            terminal: false,
            actions: vec![],
        }
    }

    pub fn terminal(state: S, reward: Continous) -> Self {
        Self {
            terminal: true,
            ..Self::new(state, reward)
        }
    }

    pub fn with_action(mut self, action: A, outcomes: Vec<(S, Continous)>) -> Self {
        self.actions.push(ActionRecord {
            action,
            outcomes: outcomes
                .into_iter()
                .map(|(next_state, probability)| Outcome {
                    next_state,
                    probability,
                })
                .collect(),
        });
        self
    }
}

/// Finite MDP held entirely in memory. State order is the record order.
#[derive(Clone, Debug)]
pub struct TabularMdp<S, A> {
    records: Vec<StateRecord<S, A>>,
    index: HashMap<S, usize>,
}

impl<S, A> TabularMdp<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + PartialEq + Debug,
{
    pub fn new(records: Vec<StateRecord<S, A>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if index.insert(r.state.clone(), i).is_some() {
                return Err(MdpError::InvalidModel(format!(
                    "duplicate state {:?}",
                    r.state
                )));
            }
        }

        for r in &records {
            if r.terminal && !r.actions.is_empty() {
                return Err(MdpError::InvalidModel(format!(
                    "terminal state {:?} has actions",
                    r.state
                )));
            }
            for (i, ar) in r.actions.iter().enumerate() {
                if r.actions[..i].iter().any(|x| x.action == ar.action) {
                    return Err(MdpError::InvalidModel(format!(
                        "duplicate action {:?} in state {:?}",
                        ar.action, r.state
                    )));
                }
                validate_outcomes(&index, &r.state, ar)?;
            }
        }

        Ok(Self { records, index })
    }

    pub fn records(&self) -> &[StateRecord<S, A>] {
        &self.records
    }

    fn record(&self, s: &S) -> Option<&StateRecord<S, A>> {
        self.index.get(s).map(|&i| &self.records[i])
    }
}

impl<S, A> TabularMdp<S, A>
where
    S: Clone + Eq + Hash + Debug + DeserializeOwned,
    A: Clone + PartialEq + Debug + DeserializeOwned,
{
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

impl<S: Serialize, A: Serialize> TabularMdp<S, A> {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }
}

fn validate_outcomes<S, A>(
    index: &HashMap<S, usize>,
    s: &S,
    ar: &ActionRecord<S, A>,
) -> Result<()>
where
    S: Eq + Hash + Debug,
    A: Debug,
{
    let mut total: Continous = 0.;
    for o in &ar.outcomes {
        if !index.contains_key(&o.next_state) {
            return Err(MdpError::InvalidModel(format!(
                "action {:?} in state {s:?} leads to unknown state {:?}",
                ar.action, o.next_state
            )));
        }
        if !o.probability.is_finite() || o.probability < 0. {
            return Err(MdpError::InvalidModel(format!(
                "action {:?} in state {s:?} has probability {}",
                ar.action, o.probability
            )));
        }
        total += o.probability;
    }

    if (total - 1.).abs() > PROBABILITY_TOLERANCE {
        return Err(MdpError::InvalidModel(format!(
            "probabilities of action {:?} in state {s:?} sum to {total}",
            ar.action
        )));
    }

    Ok(())
}

impl<S, A> Mdp for TabularMdp<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + PartialEq + Debug,
{
    type State = S;
    type Action = A;

    fn states(&self) -> Vec<S> {
        self.records.iter().map(|r| r.state.clone()).collect()
    }

    fn possible_actions(&self, s: &S) -> Vec<A> {
        self.record(s)
            .map(|r| r.actions.iter().map(|ar| ar.action.clone()).collect())
            .unwrap_or_default()
    }

    fn transition_states_and_probs(&self, s: &S, a: &A) -> Vec<(S, Continous)> {
        self.record(s)
            .and_then(|r| r.actions.iter().find(|ar| ar.action == *a))
            .map(|ar| {
                ar.outcomes
                    .iter()
                    .map(|o| (o.next_state.clone(), o.probability))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn reward(&self, s: &S) -> Continous {
        self.record(s).map_or(0., |r| r.reward)
    }

    fn is_terminal(&self, s: &S) -> bool {
        self.record(s).map_or(false, |r| r.terminal)
    }
}

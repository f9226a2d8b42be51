use crate::{
    common::defs::Continous,
    config::{validate_discount, SolverConfig},
    error::{MdpError, Result},
    mdps::{mdp::Mdp, mdp_solver::ValueEstimationAgent},
};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

/// Policy iteration with exact policy evaluation.
///
/// Runs a fixed number of {evaluate, improve} rounds on construction, with no
/// convergence check, and is read-only afterwards.
#[derive(Debug)]
pub struct PolicyIteration<M: Mdp> {
    mdp: Rc<M>,
    gamma: Continous,
    iterations: usize,
    states: Vec<M::State>,
    index: HashMap<M::State, usize>,
    policy: Vec<Option<M::Action>>,
    values: DVector<Continous>,
    stable_since: Option<usize>,
}

impl<M: Mdp> PolicyIteration<M> {
    pub fn new(mdp: Rc<M>, gamma: Continous, iterations: usize) -> Result<Self> {
        validate_discount(gamma)?;

        let states = mdp.states();
        let mut index = HashMap::with_capacity(states.len());
        for (i, s) in states.iter().enumerate() {
            if index.insert(s.clone(), i).is_some() {
                return Err(MdpError::InvalidModel(format!("duplicate state {s:?}")));
            }
        }

        let policy = states
            .iter()
            .map(|s| initial_action(&*mdp, s))
            .collect::<Result<Vec<_>>>()?;

        let mut pi = Self {
            mdp,
            gamma,
            iterations,
            values: DVector::zeros(states.len()),
            states,
            index,
            policy,
            stable_since: None,
        };
        pi.exec()?;

        Ok(pi)
    }

    pub fn from_config(mdp: Rc<M>, config: &SolverConfig) -> Result<Self> {
        config.validate()?;
        Self::new(mdp, config.discount, config.iterations)
    }

    pub fn gamma(&self) -> Continous {
        self.gamma
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// States in matrix index order.
    pub fn states(&self) -> &[M::State] {
        &self.states
    }

    /// Values in the order of [`Self::states`].
    pub fn values(&self) -> &[Continous] {
        self.values.as_slice()
    }

    /// Actions in the order of [`Self::states`].
    pub fn policy(&self) -> &[Option<M::Action>] {
        &self.policy
    }

    /// First round after which improvement left the policy unchanged.
    pub fn stable_since(&self) -> Option<usize> {
        self.stable_since
    }

    pub fn compute_q_value_from_values(&self, s: &M::State, a: &M::Action) -> Result<Continous> {
        let r = self.mdp.reward(s);
        self.mdp
            .transition_states_and_probs(s, a)
            .into_iter()
            .try_fold(0., |q: Continous, (next, p)| -> Result<Continous> {
                Ok(q + p * (r + self.gamma * self.values[self.state_index(&next)?]))
            })
    }

    fn exec(&mut self) -> Result<()> {
        for i in 1..=self.iterations {
            self.run_policy_evaluation()?;
            let changed = self.run_policy_improvement()?;
            debug!(iteration = i, changed, "policy iteration round");

            if changed > 0 {
                self.stable_since = None;
            } else if self.stable_since.is_none() {
                self.stable_since = Some(i);
            }
        }

        info!(
            n_s = self.states.len(),
            iterations = self.iterations,
            stable_since = ?self.stable_since,
            "policy iteration finished"
        );

        Ok(())
    }

    /// Solves `(I - γT) v = R` exactly (LU with partial pivoting) for the current
    /// policy and replaces the value table.
    fn run_policy_evaluation(&mut self) -> Result<()> {
        let n_s = self.states.len();
        let mut rewards = DVector::<Continous>::zeros(n_s);
        let mut trans_probs = DMatrix::<Continous>::zeros(n_s, n_s);

        for (i, (s, a)) in self.states.iter().zip(&self.policy).enumerate() {
            rewards[i] = self.mdp.reward(s);
            if let Some(a) = a {
                for (next, p) in self.mdp.transition_states_and_probs(s, a) {
                    trans_probs[(i, self.state_index(&next)?)] += p;
                }
            }
        }

        let matrix = DMatrix::<Continous>::identity(n_s, n_s) - trans_probs * self.gamma;
        self.values = matrix
            .lu()
            .solve(&rewards)
            .ok_or(MdpError::SingularSystem { n_s })?;

        Ok(())
    }

    /// Replaces the policy with the greedy one. Returns how many states changed action.
    fn run_policy_improvement(&mut self) -> Result<usize> {
        let policy = self
            .states
            .iter()
            .map(|s| self.greedy_action(s))
            .collect::<Result<Vec<_>>>()?;

        let changed = policy
            .iter()
            .zip(&self.policy)
            .filter(|(new, old)| new != old)
            .count();
        self.policy = policy;

        Ok(changed)
    }

    /// Ties keep the earliest action in `possible_actions` order.
    fn greedy_action(&self, s: &M::State) -> Result<Option<M::Action>> {
        if self.mdp.is_terminal(s) {
            return Ok(None);
        }

        let mut best: Option<(M::Action, Continous)> = None;
        for a in self.mdp.possible_actions(s) {
            let q = self.compute_q_value_from_values(s, &a)?;
            if best.as_ref().map_or(true, |(_, max)| q > *max) {
                best = Some((a, q));
            }
        }

        best.map(|(a, _)| Some(a)).ok_or_else(|| no_legal_action(s))
    }

    fn state_index(&self, s: &M::State) -> Result<usize> {
        self.index
            .get(s)
            .copied()
            .ok_or_else(|| MdpError::UnknownState(format!("{s:?}")))
    }
}

impl<M: Mdp> ValueEstimationAgent<M> for PolicyIteration<M> {
    fn get_value(&self, s: &M::State) -> Result<Continous> {
        Ok(self.values[self.state_index(s)?])
    }

    fn get_q_value(&self, s: &M::State, a: &M::Action) -> Result<Continous> {
        self.state_index(s)?;
        self.compute_q_value_from_values(s, a)
    }

    fn get_policy(&self, s: &M::State) -> Result<Option<M::Action>> {
        Ok(self.policy[self.state_index(s)?].clone())
    }
}

fn initial_action<M: Mdp>(mdp: &M, s: &M::State) -> Result<Option<M::Action>> {
    if mdp.is_terminal(s) {
        return Ok(None);
    }

    mdp.possible_actions(s)
        .into_iter()
        .next()
        .map(Some)
        .ok_or_else(|| no_legal_action(s))
}

fn no_legal_action<S: std::fmt::Debug>(s: &S) -> MdpError {
    MdpError::NoLegalAction(format!("{s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::simple_golf::*;
    use crate::mdps::tabular::{StateRecord, TabularMdp};
    use assertor::*;
    use float_eq::*;
    use rstest::rstest;

    type Records = Vec<StateRecord<&'static str, &'static str>>;

    fn solve(
        records: Records,
        gamma: Continous,
        n: usize,
    ) -> Result<PolicyIteration<TabularMdp<&'static str, &'static str>>> {
        PolicyIteration::new(Rc::new(TabularMdp::new(records).unwrap()), gamma, n)
    }

    fn chain() -> Records {
        vec![
            StateRecord::new("A", 0.).with_action("go", vec![("B", 1.)]),
            StateRecord::terminal("B", 10.),
        ]
    }

    #[rstest]
    #[case(-3.5)]
    #[case(0.)]
    #[case(42.)]
    fn single_terminal_state_is_worth_its_reward(#[case] r: Continous) {
        let pi = solve(vec![StateRecord::terminal("T", r)], 0.9, 1).unwrap();

        assert_float_eq!(pi.get_value(&"T").unwrap(), r, abs <= 1e-12);
        assert_that!(pi.get_policy(&"T").unwrap()).is_none();
    }

    #[test]
    fn zero_iterations_keep_initial_tables() {
        let pi = solve(chain(), 0.9, 0).unwrap();

        assert_float_eq!(pi.values().to_vec(), vec![0., 0.], abs_all <= 1e-12);
        assert_that!(pi.get_policy(&"A").unwrap()).is_equal_to(Some("go"));
        assert_that!(pi.get_policy(&"B").unwrap()).is_none();
        assert_that!(pi.stable_since()).is_none();
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(20)]
    fn chain_values_follow_discounted_reward(#[case] n: usize) {
        let pi = solve(chain(), 0.9, n).unwrap();

        assert_float_eq!(pi.get_value(&"B").unwrap(), 10., abs <= 1e-9);
        assert_float_eq!(pi.get_value(&"A").unwrap(), 9., abs <= 1e-9);
        assert_that!(pi.get_action(&"A").unwrap()).is_equal_to(Some("go"));
    }

    #[test]
    fn golf_converges_to_putting() {
        let pi = PolicyIteration::new(Rc::new(SimpleGolf::new()), 0.9, 10).unwrap();

        let v_green = 8.1 / 0.91;
        let v_fairway = 0.81 * v_green / 0.91;
        assert_float_eq!(
            pi.values().to_vec(),
            vec![v_fairway, v_green, 10.],
            abs_all <= 1e-9
        );
        assert_that!(pi.get_policy(&SimpleGolf::GREEN).unwrap())
            .is_equal_to(Some(GolfAction::HitInHole));
        assert_that!(pi.get_policy(&SimpleGolf::FAIRWAY).unwrap())
            .is_equal_to(Some(GolfAction::HitToGreen));
        assert_that!(pi.get_policy(&SimpleGolf::HOLE).unwrap()).is_none();
        assert_that!(pi.stable_since()).is_equal_to(Some(2));
    }

    #[test]
    fn golf_initial_policy_is_first_action() {
        let pi = PolicyIteration::new(Rc::new(SimpleGolf::new()), 0.9, 0).unwrap();

        assert_that!(pi.policy().to_vec()).is_equal_to(vec![
            Some(GolfAction::HitToGreen),
            Some(GolfAction::HitToFairway),
            None,
        ]);
    }

    #[rstest]
    #[case(vec!["left", "right"], "left")]
    #[case(vec!["right", "left"], "right")]
    fn ties_keep_first_action(#[case] order: Vec<&'static str>, #[case] expected: &'static str) {
        let mut s = StateRecord::new("S", 0.);
        for a in order {
            s = s.with_action(a, vec![("T", 1.)]);
        }
        let pi = solve(vec![s, StateRecord::terminal("T", 1.)], 0.9, 3).unwrap();

        assert_that!(pi.get_policy(&"S").unwrap()).is_equal_to(Some(expected));
    }

    #[test]
    fn improvement_picks_better_later_action() {
        let records = vec![
            StateRecord::new("S", 0.)
                .with_action("bad", vec![("L", 1.)])
                .with_action("good", vec![("W", 1.)]),
            StateRecord::terminal("L", -1.),
            StateRecord::terminal("W", 1.),
        ];

        let pi = solve(records, 0.5, 2).unwrap();

        assert_that!(pi.get_policy(&"S").unwrap()).is_equal_to(Some("good"));
        assert_float_eq!(pi.get_value(&"S").unwrap(), 0.5, abs <= 1e-12);
        assert_float_eq!(pi.get_q_value(&"S", &"bad").unwrap(), -0.5, abs <= 1e-12);
    }

    #[test]
    fn converged_round_is_a_fixed_point() {
        let mut pi = PolicyIteration::new(Rc::new(SimpleGolf::new()), 0.9, 10).unwrap();
        let policy = pi.policy().to_vec();
        let values = pi.values().to_vec();

        pi.run_policy_evaluation().unwrap();
        let changed = pi.run_policy_improvement().unwrap();

        assert_eq!(changed, 0);
        assert_that!(pi.policy().to_vec()).is_equal_to(policy);
        assert_float_eq!(pi.values().to_vec(), values, abs_all <= 1e-12);
    }

    #[test]
    fn q_value_of_policy_action_matches_value() {
        let pi = PolicyIteration::new(Rc::new(SimpleGolf::new()), 0.9, 10).unwrap();

        for s in [SimpleGolf::FAIRWAY, SimpleGolf::GREEN] {
            let a = pi.get_policy(&s).unwrap().unwrap();
            assert_float_eq!(
                pi.get_q_value(&s, &a).unwrap(),
                pi.get_value(&s).unwrap(),
                abs <= 1e-9
            );
        }
    }

    #[test]
    fn undiscounted_cycle_is_singular() {
        let records = vec![
            StateRecord::new("A", 1.).with_action("go", vec![("B", 1.)]),
            StateRecord::new("B", 1.).with_action("go", vec![("A", 1.)]),
        ];

        assert!(matches!(
            solve(records, 1., 1),
            Err(MdpError::SingularSystem { .. })
        ));
    }

    #[test]
    fn undiscounted_chain_is_solvable() {
        let pi = solve(chain(), 1., 1).unwrap();

        assert_float_eq!(pi.get_value(&"A").unwrap(), 10., abs <= 1e-12);
    }

    #[test]
    fn nearly_undiscounted_cycle_is_solvable() {
        let gamma = 1. - 1e-13;
        let records = vec![
            StateRecord::new("A", 1.).with_action("go", vec![("B", 1.)]),
            StateRecord::new("B", 1.).with_action("go", vec![("A", 1.)]),
        ];

        let pi = solve(records, gamma, 1).unwrap();

        let expected = 1. / (1. - gamma);
        assert_float_eq!(pi.get_value(&"A").unwrap(), expected, rmax <= 1e-2);
        assert_float_eq!(pi.get_value(&"B").unwrap(), expected, rmax <= 1e-2);
    }

    /// Leaks into a successor that `states` does not list.
    struct Leaky;

    impl Mdp for Leaky {
        type State = u8;
        type Action = ();

        fn states(&self) -> Vec<u8> {
            vec![0]
        }

        fn possible_actions(&self, _: &u8) -> Vec<()> {
            vec![()]
        }

        fn transition_states_and_probs(&self, _: &u8, _: &()) -> Vec<(u8, Continous)> {
            vec![(7, 1.)]
        }

        fn reward(&self, _: &u8) -> Continous {
            0.
        }

        fn is_terminal(&self, _: &u8) -> bool {
            false
        }
    }

    #[test]
    fn successor_outside_state_list_is_rejected() {
        assert!(matches!(
            PolicyIteration::new(Rc::new(Leaky), 0.9, 1),
            Err(MdpError::UnknownState(_))
        ));
    }

    #[test]
    fn non_terminal_state_without_actions_is_rejected() {
        let records = vec![StateRecord::new("A", 0.), StateRecord::terminal("B", 1.)];

        assert!(matches!(
            solve(records, 0.9, 1),
            Err(MdpError::NoLegalAction(_))
        ));
    }

    #[test]
    fn invalid_discount_is_rejected() {
        assert!(matches!(
            solve(chain(), 1.1, 1),
            Err(MdpError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn accessors_reject_unknown_states() {
        let pi = solve(chain(), 0.9, 1).unwrap();

        assert!(matches!(pi.get_value(&"Z"), Err(MdpError::UnknownState(_))));
        assert!(matches!(pi.get_q_value(&"Z", &"go"), Err(MdpError::UnknownState(_))));
        assert!(matches!(pi.get_policy(&"Z"), Err(MdpError::UnknownState(_))));
        assert!(matches!(pi.get_action(&"Z"), Err(MdpError::UnknownState(_))));
    }

    #[test]
    fn from_config_uses_discount_and_iterations() {
        let config = SolverConfig {
            discount: 0.5,
            iterations: 3,
        };

        let mdp = Rc::new(TabularMdp::new(chain()).unwrap());
        let pi = PolicyIteration::from_config(mdp, &config).unwrap();

        assert_eq!(pi.iterations(), 3);
        assert_float_eq!(pi.get_value(&"A").unwrap(), 5., abs <= 1e-12);
    }
}

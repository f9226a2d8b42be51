use crate::{common::defs::Continous, mdps::mdp::Mdp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GolfAction {
    HitToGreen,
    HitToFairway,
    HitInHole,
}

/// https://towardsdatascience.com/reinforcement-learning-an-easy-introduction-to-value-iteration-e4cfe0731fd5
///
/// States: 0 fairway, 1 green, 2 hole. Sinking the ball is worth 10.
#[derive(Clone, Debug, Default)]
pub struct SimpleGolf;

impl SimpleGolf {
    pub const FAIRWAY: usize = 0;
    pub const GREEN: usize = 1;
    pub const HOLE: usize = 2;

    pub fn new() -> Self {
        Self
    }
}

impl Mdp for SimpleGolf {
    type State = usize;
    type Action = GolfAction;

    fn states(&self) -> Vec<usize> {
        vec![Self::FAIRWAY, Self::GREEN, Self::HOLE]
    }

    fn possible_actions(&self, s: &usize) -> Vec<GolfAction> {
        match *s {
            Self::FAIRWAY => vec![GolfAction::HitToGreen],
            Self::GREEN => vec![GolfAction::HitToFairway, GolfAction::HitInHole],
            _ => vec![],
        }
    }

    fn transition_states_and_probs(&self, s: &usize, a: &GolfAction) -> Vec<(usize, Continous)> {
        match (*s, a) {
            (Self::FAIRWAY, GolfAction::HitToGreen) => vec![(Self::GREEN, 0.9), (Self::FAIRWAY, 0.1)],
            (Self::GREEN, GolfAction::HitToFairway) => vec![(Self::FAIRWAY, 0.9), (Self::GREEN, 0.1)],
            (Self::GREEN, GolfAction::HitInHole) => vec![(Self::HOLE, 0.9), (Self::GREEN, 0.1)],
            _ => vec![],
        }
    }

    fn reward(&self, s: &usize) -> Continous {
        if *s == Self::HOLE {
            10.
        } else {
            0.
        }
    }

    fn is_terminal(&self, s: &usize) -> bool {
        *s == Self::HOLE
    }
}

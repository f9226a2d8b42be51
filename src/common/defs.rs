pub type Continous = f64;

/// Slack allowed when checking that a transition distribution sums to one.
pub const PROBABILITY_TOLERANCE: Continous = 1e-6;

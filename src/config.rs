use crate::{
    common::defs::Continous,
    error::{MdpError, Result},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const DEFAULT_DISCOUNT: Continous = 0.9;
pub const DEFAULT_ITERATIONS: usize = 20;

/// Knobs of a policy iteration run. Missing JSON fields fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub discount: Continous,
    pub iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            discount: DEFAULT_DISCOUNT,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl SolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_discount(self.discount)
    }
}

/// γ = 1 is accepted; it only fails later if the policy makes the system singular.
pub fn validate_discount(gamma: Continous) -> Result<()> {
    if (0.0..=1.0).contains(&gamma) {
        Ok(())
    } else {
        Err(MdpError::InvalidDiscount(gamma))
    }
}

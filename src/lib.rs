pub mod common;
pub mod config;
pub mod envs;
pub mod error;
pub mod mdps;

pub use common::defs::*;
pub use config::SolverConfig;
pub use error::{MdpError, Result};
pub use mdps::{mdp::*, mdp_simulator::*, mdp_solver::*, solvers::policy_iteration::*, tabular::*};

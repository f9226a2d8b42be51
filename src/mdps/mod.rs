pub mod mdp;
pub mod mdp_simulator;
pub mod mdp_solver;
pub mod solvers;
pub mod tabular;

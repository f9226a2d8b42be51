pub mod policy_iteration;

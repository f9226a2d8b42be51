//! Error types for MDP models and solvers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdpError {
    /// `(I - γT)` has no inverse for the current policy.
    #[error("Singular system: (I - gamma * T) is not invertible over {n_s} states")]
    SingularSystem { n_s: usize },

    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// A non-terminal state offers no action to choose from.
    #[error("No legal action for non-terminal state: {0}")]
    NoLegalAction(String),

    #[error("Invalid discount: {0} (expected 0 <= gamma <= 1)")]
    InvalidDiscount(f64),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MdpError>;

//! Solver error types.

use lpn_network::NetworkError;
use thiserror::Error;

/// Errors raised by the network orchestrator.
#[derive(Error, Debug, Clone)]
pub enum SolverError {
    /// Invalid or missing configuration, or a network that was never
    /// (or doubly) initialized. Fatal: the solver refuses to step until
    /// re-initialized.
    #[error("Initialization failed: {what}")]
    Initialization { what: String },

    /// Math failure during decomposition or solution. Not fatal; the
    /// caller may catch, log, and continue on the previous major-frame
    /// state.
    #[error("Numerical failure: {what}")]
    Numerical { what: String },

    /// Iteration-limit or index fault (e.g. the decomposition limit was
    /// exceeded within one minor step).
    #[error("Out of bounds: {what}")]
    OutOfBounds { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<NetworkError> for SolverError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::Initialization { what } => SolverError::Initialization { what },
            NetworkError::Numerical { what } => SolverError::Numerical { what },
            NetworkError::OutOfBounds { what } => SolverError::OutOfBounds { what },
        }
    }
}

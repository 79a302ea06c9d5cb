//! Network-layer error types.

use lpn_fluids::FluidError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// Invalid node/link setup. Fatal to the owning network.
    #[error("Initialization failed: {what}")]
    Initialization { what: String },

    /// Math failure during flow integration or transport.
    #[error("Numerical failure: {what}")]
    Numerical { what: String },

    /// Invalid port or node argument.
    #[error("Out of bounds: {what}")]
    OutOfBounds { what: String },
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<FluidError> for NetworkError {
    fn from(e: FluidError) -> Self {
        match e {
            FluidError::Initialization { what } => NetworkError::Initialization { what },
            FluidError::Numerical { what } => NetworkError::Numerical { what },
            FluidError::OutOfBounds { what } => NetworkError::OutOfBounds { what },
        }
    }
}

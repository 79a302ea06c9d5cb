//! Fluid-model error types.

use thiserror::Error;

/// Errors raised by the composite-fluid model.
#[derive(Error, Debug, Clone)]
pub enum FluidError {
    /// Invalid or inconsistent configuration/input data. Raised from
    /// construction; the fluid is unusable until rebuilt.
    #[error("Initialization failed: {what}")]
    Initialization { what: String },

    /// Math failure in a state update (zero combined flow, vanishing
    /// molecular weight).
    #[error("Numerical failure: {what}")]
    Numerical { what: String },

    /// Invalid fluid-type or index lookup.
    #[error("Out of bounds: {what}")]
    OutOfBounds { what: String },
}

pub type FluidResult<T> = Result<T, FluidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FluidError::OutOfBounds {
            what: "no such constituent".into(),
        };
        assert!(err.to_string().contains("no such constituent"));
    }
}

//! lpn-solver: the network orchestrator.
//!
//! Assembles the admittance matrix and source vector from link
//! contributions, iterates the minor-step build/solve/assess loop until
//! every non-linear link accepts the solution, partitions the network
//! into islands, probes per-node network capacitance, and dispatches
//! post-convergence flow integration.

pub mod cholesky;
pub mod error;
pub mod islands;
pub mod solver;
pub mod sor;
pub mod step_log;

// Re-exports for ergonomics
pub use error::{SolverError, SolverResult};
pub use islands::Islands;
pub use solver::{
    GpuMode, IslandMode, RunMode, Solver, SolverCheckpoint, SolverConfig, SolverMetrics,
    SolverMode,
};
pub use step_log::{MinorStepRecord, StepLog, StepResult};

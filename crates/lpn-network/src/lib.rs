//! lpn-network: node and link layer for lumped-parameter networks.
//!
//! Provides:
//! - Node state shared by all network domains (`NodeCore`, `BasicNode`)
//! - Fluid nodes carrying a contained mixture and flow bookkeeping
//! - The abstract link contract the solver assembles and polls
//! - Post-convergence flow orchestration

pub mod error;
pub mod flow;
pub mod fluid_node;
pub mod link;
pub mod node;

// Re-exports for ergonomics
pub use error::{NetworkError, NetworkResult};
pub use flow::{FlowOrchestrator, TransportOrchestrator};
pub use fluid_node::FluidNode;
pub use link::{AdmittanceMap, Link, LinkCore, PortCommand, PortDirection, SolutionResult};
pub use node::{BasicNode, NodeCore, SolverNode};

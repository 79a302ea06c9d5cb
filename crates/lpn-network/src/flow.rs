//! Post-convergence flow orchestration.

use crate::error::NetworkResult;
use crate::link::Link;
use crate::node::SolverNode;

/// Drives node inflow integration and link flow transport after the
/// network solution converges. The solver owns one orchestrator and
/// calls `update` once per converged major step.
pub trait FlowOrchestrator<N: SolverNode> {
    fn update(
        &mut self,
        dt: f64,
        links: &mut [Box<dyn Link<N>>],
        nodes: &mut [N],
    ) -> NetworkResult<()>;
}

/// Default orchestrator. Order per major step:
/// 1. every link computes its flux and port directions,
/// 2. every link transports flow into the node accumulators,
/// 3. every non-ground node integrates its collected flows,
/// 4. the ground node's content is reset (it is an infinite boundary).
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportOrchestrator;

impl<N: SolverNode> FlowOrchestrator<N> for TransportOrchestrator {
    fn update(
        &mut self,
        dt: f64,
        links: &mut [Box<dyn Link<N>>],
        nodes: &mut [N],
    ) -> NetworkResult<()> {
        for link in links.iter_mut() {
            link.compute_flows(dt, nodes)?;
        }
        for link in links.iter_mut() {
            link.transport_flows(dt, nodes)?;
        }
        let ground = nodes.len() - 1;
        for (index, node) in nodes.iter_mut().enumerate() {
            if index == ground {
                node.reset_content_state();
            } else {
                node.integrate_flows(dt)?;
            }
        }
        Ok(())
    }
}

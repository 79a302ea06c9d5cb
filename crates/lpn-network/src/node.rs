//! Node state and the solver-facing node contract.

use crate::error::{NetworkError, NetworkResult};
use lpn_core::ensure_finite;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-node state every network domain shares: the solved potential,
/// flow accumulators, and the network-capacitance probe terms.
///
/// The island membership and the capacitance delta-potential row are
/// per-step scratch owned here for the links' benefit; neither is
/// persisted across checkpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeCore {
    name: String,
    init: bool,
    potential: f64,
    influx_rate: f64,
    outflux_rate: f64,
    scheduled_outflux: f64,
    net_flux: f64,
    flux_through: f64,
    network_capacitance: f64,
    network_capacitance_request: f64,
    /// Non-owning view of this node's island, rebuilt by the solver each
    /// step while island mode is active.
    #[serde(skip)]
    island: Option<Arc<Vec<usize>>>,
    /// Potential deltas at every node in response to this node's
    /// capacitance probe flux.
    #[serde(skip)]
    netcap_delta_potential: Vec<f64>,
}

impl NodeCore {
    pub fn new(name: &str, potential: f64) -> Self {
        Self {
            name: name.to_string(),
            init: !name.is_empty(),
            potential,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.init
    }

    pub fn potential(&self) -> f64 {
        self.potential
    }

    pub fn set_potential(&mut self, potential: f64) {
        self.potential = potential;
    }

    pub fn influx_rate(&self) -> f64 {
        self.influx_rate
    }

    pub fn outflux_rate(&self) -> f64 {
        self.outflux_rate
    }

    pub fn scheduled_outflux(&self) -> f64 {
        self.scheduled_outflux
    }

    pub fn net_flux(&self) -> f64 {
        self.net_flux
    }

    pub fn flux_through(&self) -> f64 {
        self.flux_through
    }

    pub fn collect_influx_rate(&mut self, rate: f64) {
        self.influx_rate += rate;
    }

    pub fn collect_outflux_rate(&mut self, rate: f64) {
        self.outflux_rate += rate;
    }

    pub fn schedule_outflux(&mut self, rate: f64) {
        self.scheduled_outflux += rate;
    }

    /// Clear the flow accumulators for a new major step. The potential is
    /// preserved.
    pub fn reset_flows(&mut self) {
        self.influx_rate = 0.0;
        self.outflux_rate = 0.0;
        self.scheduled_outflux = 0.0;
        self.net_flux = 0.0;
        self.flux_through = 0.0;
    }

    /// Fold the accumulated fluxes into the derived terms.
    pub fn update_derived_flux(&mut self) {
        self.net_flux = self.influx_rate - self.outflux_rate;
        self.flux_through = self.influx_rate.min(self.outflux_rate);
    }

    pub fn network_capacitance(&self) -> f64 {
        self.network_capacitance
    }

    pub fn set_network_capacitance(&mut self, capacitance: f64) {
        self.network_capacitance = capacitance;
    }

    pub fn network_capacitance_request(&self) -> f64 {
        self.network_capacitance_request
    }

    /// Request a capacitance probe with the given flux perturbation on the
    /// next solution.
    pub fn set_network_capacitance_request(&mut self, flux: f64) {
        self.network_capacitance_request = flux;
    }

    pub fn island(&self) -> Option<&Arc<Vec<usize>>> {
        self.island.as_ref()
    }

    pub fn set_island(&mut self, island: Option<Arc<Vec<usize>>>) {
        self.island = island;
    }

    /// Size the capacitance delta-potential row for a network of n nodes.
    pub fn allocate_netcap(&mut self, n: usize) {
        self.netcap_delta_potential = vec![0.0; n];
    }

    pub fn netcap_delta_potential(&self) -> &[f64] {
        &self.netcap_delta_potential
    }

    pub fn netcap_delta_potential_mut(&mut self) -> &mut [f64] {
        &mut self.netcap_delta_potential
    }
}

/// The node contract the solver drives.
///
/// The solver owns a homogeneous slab of nodes; the last slab entry is
/// the ground node, which never enters the system of equations.
pub trait SolverNode {
    fn core(&self) -> &NodeCore;
    fn core_mut(&mut self) -> &mut NodeCore;

    /// Check initialization consistency before the first step.
    fn validate(&self) -> NetworkResult<()>;

    /// One-time hookup before the first step.
    fn prepare_for_start(&mut self) {}

    /// Clear flow accumulators for a new major step.
    fn reset_flows(&mut self) {
        self.core_mut().reset_flows();
    }

    /// Reset any contained content (used for the ground node).
    fn reset_content_state(&mut self) {}

    /// Integrate the collected flows over the step after convergence.
    fn integrate_flows(&mut self, dt: f64) -> NetworkResult<()>;

    /// Recompute derived state after a checkpoint load.
    fn restart(&mut self) -> NetworkResult<()>;
}

/// A scalar-potential node with no contained substance: the generic
/// (electrical, thermal) network node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicNode {
    core: NodeCore,
}

impl BasicNode {
    pub fn new(name: &str, potential: f64) -> Self {
        Self {
            core: NodeCore::new(name, potential),
        }
    }
}

impl SolverNode for BasicNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn validate(&self) -> NetworkResult<()> {
        if !self.core.is_initialized() {
            return Err(NetworkError::Initialization {
                what: "node has no name".into(),
            });
        }
        ensure_finite(self.core.potential(), "node potential").map_err(|e| {
            NetworkError::Initialization {
                what: e.to_string(),
            }
        })?;
        Ok(())
    }

    fn integrate_flows(&mut self, _dt: f64) -> NetworkResult<()> {
        self.core.update_derived_flux();
        Ok(())
    }

    fn restart(&mut self) -> NetworkResult<()> {
        Ok(())
    }
}

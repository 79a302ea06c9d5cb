//! The abstract link contract.
//!
//! A link contributes admittance and source terms to the system of
//! equations through a compressed buffer plus a map into row-major
//! matrix positions. The solver writes solved potentials back into the
//! link's port-potential vector and polls non-linear links for
//! acceptance of each minor-step solution.

use crate::error::{NetworkError, NetworkResult};
use crate::node::SolverNode;
use serde::{Deserialize, Serialize};

/// A non-linear link's verdict on a minor-step solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionResult {
    Confirm,
    Reject,
    Delay,
}

/// Flow direction at a link port, relative to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortDirection {
    #[default]
    None,
    /// The node supplies flow to the link.
    Source,
    /// The node receives flow from the link.
    Sink,
    Both,
}

/// Queued request to re-map a link port to a different node, drained at
/// the top of the link's step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortCommand {
    pub port: usize,
    pub node: usize,
}

/// Compressed admittance contribution: `values[slot]` accumulates into
/// row-major matrix position `targets[slot]`. Slots targeting `None`
/// (the ground sentinel) or positions outside the matrix are dropped
/// during assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmittanceMap {
    pub values: Vec<f64>,
    pub targets: Vec<Option<usize>>,
}

impl AdmittanceMap {
    pub fn new(slots: usize) -> Self {
        Self {
            values: vec![0.0; slots],
            targets: vec![None; slots],
        }
    }

    /// Standard port-pair layout: one slot per (port row, port col) pair,
    /// mapped through the link's node map. Ports on the ground node
    /// (index >= network size) get dropped targets.
    pub fn map_ports(&mut self, node_map: &[usize], network_size: usize) {
        let ports = node_map.len();
        debug_assert_eq!(self.values.len(), ports * ports);
        for (slot, target) in self.targets.iter_mut().enumerate() {
            let row = node_map[slot / ports];
            let col = node_map[slot % ports];
            *target = (row < network_size && col < network_size)
                .then_some(row * network_size + col);
        }
    }
}

/// State common to every link, owned by the concrete link type and
/// exposed to the solver through [`Link::core`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCore {
    name: String,
    init: bool,
    /// Number of non-ground nodes; node index == network_size is ground.
    network_size: usize,
    /// Port-to-node map; the network's last node index is ground.
    pub node_map: Vec<usize>,
    /// Per-port potential snapshot, written by the solver on output.
    pub potentials: Vec<f64>,
    /// Per-port override flags: a set flag makes the solver copy the
    /// port potential over the solution at that node.
    pub overrides: Vec<bool>,
    /// Per-port source contribution, positive into the node.
    pub source: Vec<f64>,
    pub admittance: AdmittanceMap,
    /// Set by the link when its admittance contribution changed.
    pub needs_admittance_update: bool,
    pub port_directions: Vec<PortDirection>,
    port_commands: Vec<PortCommand>,
    /// Floor for potentials used in admittance linearization.
    pub min_linearization_potential: f64,
}

impl LinkCore {
    pub fn new(name: &str, node_map: Vec<usize>, network_size: usize) -> Self {
        let ports = node_map.len();
        let mut core = Self {
            name: name.to_string(),
            init: false,
            network_size,
            node_map,
            potentials: vec![0.0; ports],
            overrides: vec![false; ports],
            source: vec![0.0; ports],
            admittance: AdmittanceMap::new(ports * ports),
            needs_admittance_update: false,
            port_directions: vec![PortDirection::None; ports],
            port_commands: Vec::new(),
            min_linearization_potential: 1.0,
        };
        core.remap_admittance();
        core
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_ports(&self) -> usize {
        self.node_map.len()
    }

    pub fn network_size(&self) -> usize {
        self.network_size
    }

    /// Index of the ground node for this network.
    pub fn ground(&self) -> usize {
        self.network_size
    }

    /// Rebuild the admittance slot targets from the current node map.
    pub fn remap_admittance(&mut self) {
        let node_map = std::mem::take(&mut self.node_map);
        self.admittance.map_ports(&node_map, self.network_size);
        self.node_map = node_map;
    }

    pub fn is_initialized(&self) -> bool {
        self.init
    }

    pub fn set_initialized(&mut self) {
        self.init = true;
    }

    pub fn queue_port_command(&mut self, command: PortCommand) {
        self.port_commands.push(command);
    }

    /// Drain queued port re-maps. Invalid port indices are reported;
    /// the node index is validated by the caller's network size.
    pub fn apply_port_commands(&mut self) -> NetworkResult<()> {
        for command in std::mem::take(&mut self.port_commands) {
            let ports = self.node_map.len();
            let slot =
                self.node_map
                    .get_mut(command.port)
                    .ok_or_else(|| NetworkError::OutOfBounds {
                        what: format!("port command port {} out of range {ports}", command.port),
                    })?;
            *slot = command.node;
            self.needs_admittance_update = true;
        }
        if self.needs_admittance_update {
            self.remap_admittance();
        }
        Ok(())
    }

    /// Set or clear a port's potential override.
    pub fn set_port_override(&mut self, port: usize, potential: Option<f64>) -> NetworkResult<()> {
        let ports = self.node_map.len();
        if port >= ports {
            return Err(NetworkError::OutOfBounds {
                what: format!("override port {port} out of range {ports}"),
            });
        }
        match potential {
            Some(value) => {
                self.overrides[port] = true;
                self.potentials[port] = value;
            }
            None => self.overrides[port] = false,
        }
        Ok(())
    }
}

/// The link contract the solver drives. `N` is the node flavour of the
/// network the link participates in.
#[allow(unused_variables)]
pub trait Link<N: SolverNode> {
    fn core(&self) -> &LinkCore;
    fn core_mut(&mut self) -> &mut LinkCore;

    /// Whether the link takes part in the minor-step acceptance protocol.
    fn is_non_linear(&self) -> bool {
        false
    }

    /// First-minor-step hook: update admittance and source contributions.
    fn step(&mut self, dt: f64, nodes: &mut [N]) -> NetworkResult<()>;

    /// Subsequent-minor-step hook, called on non-linear links only.
    fn minor_step(&mut self, dt: f64, minor_step: usize, nodes: &mut [N]) -> NetworkResult<()> {
        Ok(())
    }

    /// External-input hook, once per major step before anything else.
    fn process_inputs(&mut self) {}

    /// External-output hook, once per major step after the flows (called
    /// in reverse link order).
    fn process_outputs(&mut self) {}

    /// Non-linear assessment of the current minor-step solution.
    fn confirm_solution_acceptable(
        &mut self,
        converged_step: usize,
        absolute_step: usize,
        nodes: &[N],
    ) -> SolutionResult {
        SolutionResult::Confirm
    }

    /// Restore internal state after the network rejected a solution.
    /// Returns false if the link could not reset.
    fn reset_last_minor_step(&mut self, converged_step: usize, absolute_step: usize) -> bool {
        true
    }

    /// Recompute derived state after a checkpoint load.
    fn restart(&mut self) -> NetworkResult<()> {
        Ok(())
    }

    /// Post-convergence: compute flux and port directions.
    fn compute_flows(&mut self, dt: f64, nodes: &mut [N]) -> NetworkResult<()>;

    /// Post-convergence: move flow between the link and its nodes.
    fn transport_flows(&mut self, dt: f64, nodes: &mut [N]) -> NetworkResult<()> {
        Ok(())
    }
}

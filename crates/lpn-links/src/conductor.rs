//! Two-port constant conductor.

use lpn_network::{Link, LinkCore, NetworkResult, PortDirection, SolverNode};

/// A fixed conductance G between two ports. Contributes the standard
/// [+G, −G; −G, +G] stamp and a flux G·(p₀ − p₁) through the link.
#[derive(Debug, Clone)]
pub struct Conductor {
    core: LinkCore,
    conductance: f64,
    /// Conductance currently loaded into the admittance buffer.
    built_conductance: f64,
    flux: f64,
}

impl Conductor {
    pub fn new(name: &str, port0: usize, port1: usize, network_size: usize, conductance: f64) -> Self {
        let mut core = LinkCore::new(name, vec![port0, port1], network_size);
        core.set_initialized();
        Self {
            core,
            conductance,
            built_conductance: -1.0,
            flux: 0.0,
        }
    }

    pub fn conductance(&self) -> f64 {
        self.conductance
    }

    /// Change the conductance; takes effect on the next step.
    pub fn set_conductance(&mut self, conductance: f64) {
        self.conductance = conductance;
    }

    pub fn flux(&self) -> f64 {
        self.flux
    }
}

impl<N: SolverNode> Link<N> for Conductor {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn step(&mut self, _dt: f64, _nodes: &mut [N]) -> NetworkResult<()> {
        self.core.apply_port_commands()?;
        if self.conductance != self.built_conductance {
            let g = self.conductance;
            self.core.admittance.values.copy_from_slice(&[g, -g, -g, g]);
            self.built_conductance = g;
            self.core.needs_admittance_update = true;
        }
        Ok(())
    }

    fn compute_flows(&mut self, _dt: f64, nodes: &mut [N]) -> NetworkResult<()> {
        let drop = self.core.potentials[0] - self.core.potentials[1];
        self.flux = self.conductance * drop;

        let (dir0, dir1) = if self.flux > f64::EPSILON {
            (PortDirection::Source, PortDirection::Sink)
        } else if self.flux < -f64::EPSILON {
            (PortDirection::Sink, PortDirection::Source)
        } else {
            (PortDirection::None, PortDirection::None)
        };
        self.core.port_directions[0] = dir0;
        self.core.port_directions[1] = dir1;

        let (from, to) = if self.flux >= 0.0 { (0, 1) } else { (1, 0) };
        let magnitude = self.flux.abs();
        if magnitude > f64::EPSILON {
            let source = nodes[self.core.node_map[from]].core_mut();
            source.schedule_outflux(magnitude);
            source.collect_outflux_rate(magnitude);
            nodes[self.core.node_map[to]]
                .core_mut()
                .collect_influx_rate(magnitude);
        }
        Ok(())
    }
}

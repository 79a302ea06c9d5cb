//! Ideal flux source.

use lpn_network::{Link, LinkCore, NetworkResult, PortDirection, SolverNode};

/// Forces a fixed flux from port 0 to port 1, independent of potential.
/// With port 0 on ground this is a pure injection into the port-1 node.
#[derive(Debug, Clone)]
pub struct FluxSource {
    core: LinkCore,
    demand: f64,
}

impl FluxSource {
    pub fn new(name: &str, port0: usize, port1: usize, network_size: usize, demand: f64) -> Self {
        let mut core = LinkCore::new(name, vec![port0, port1], network_size);
        core.set_initialized();
        Self { core, demand }
    }

    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn set_demand(&mut self, demand: f64) {
        self.demand = demand;
    }
}

impl<N: SolverNode> Link<N> for FluxSource {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn step(&mut self, _dt: f64, _nodes: &mut [N]) -> NetworkResult<()> {
        self.core.apply_port_commands()?;
        self.core.source[0] = -self.demand;
        self.core.source[1] = self.demand;
        Ok(())
    }

    fn compute_flows(&mut self, _dt: f64, nodes: &mut [N]) -> NetworkResult<()> {
        let flux = self.demand;
        if flux.abs() > f64::EPSILON {
            let (from, to) = if flux >= 0.0 { (0, 1) } else { (1, 0) };
            self.core.port_directions[from] = PortDirection::Source;
            self.core.port_directions[to] = PortDirection::Sink;
            let source = nodes[self.core.node_map[from]].core_mut();
            source.schedule_outflux(flux.abs());
            source.collect_outflux_rate(flux.abs());
            nodes[self.core.node_map[to]]
                .core_mut()
                .collect_influx_rate(flux.abs());
        } else {
            self.core.port_directions.fill(PortDirection::None);
        }
        Ok(())
    }
}

//! One-port fluid source boundary.

use crate::TRANSPORT_LIMIT;
use lpn_fluids::{Mixture, Phase};
use lpn_network::{FluidNode, Link, LinkCore, NetworkError, NetworkResult, PortDirection};

/// Configuration of a [`SourceBoundary`].
#[derive(Debug, Clone, Default)]
pub struct SourceBoundaryConfig {
    /// True makes positive demand flow out of the node.
    pub flip_flow_sign: bool,
    /// True flows only trace compounds, never bulk fluid.
    pub trace_compounds_only: bool,
    /// True refuses to attach to a liquid node.
    pub gas_only: bool,
}

/// Injects (or extracts) a prescribed mixture at a single node,
/// representing flow to or from something outside the network.
///
/// In bulk mode the internal fluid is delivered to the node's inflow
/// collection; negative demand forces outflow of the prescribed mixture.
/// In trace-compounds-only mode the per-compound rates go straight into
/// the node's trace inflow accumulator and no bulk mass moves.
#[derive(Debug, Clone)]
pub struct SourceBoundary {
    core: LinkCore,
    flip_flow_sign: bool,
    trace_compounds_only: bool,
    /// Demanded mass flow rate (kg/s), positive into the node before the
    /// sign flip.
    flow_demand: f64,
    malf_blockage_flag: bool,
    malf_blockage_value: f64,
    internal_fluid: Mixture,
    /// Per-trace-compound mass rate per unit bulk flow (kg/s per kg/s).
    trace_rates: Vec<f64>,
    /// Actual bulk flow this step after sign and blockage (kg/s).
    flow_rate: f64,
    /// Molar flux delivered to the source vector (kg·mol/s).
    flux: f64,
}

impl SourceBoundary {
    /// Build and validate the link against its attached node.
    pub fn new(
        name: &str,
        config: SourceBoundaryConfig,
        node: usize,
        network_size: usize,
        flow_demand: f64,
        internal_fluid: Mixture,
        trace_rates: Vec<f64>,
        nodes: &[FluidNode],
    ) -> NetworkResult<Self> {
        let attached = nodes.get(node).ok_or_else(|| NetworkError::Initialization {
            what: format!("{name}: port node {node} out of range {}", nodes.len()),
        })?;

        if config.gas_only && attached.content().phase() == Phase::Liquid {
            return Err(NetworkError::Initialization {
                what: format!("{name}: cannot attach a gas-only source to a liquid node"),
            });
        }
        if config.trace_compounds_only {
            if attached.content().trace_compounds().is_none() {
                return Err(NetworkError::Initialization {
                    what: format!(
                        "{name}: trace-compounds-only mode but the network has no trace compounds"
                    ),
                });
            }
            if trace_rates.is_empty() {
                return Err(NetworkError::Initialization {
                    what: format!("{name}: trace-compounds-only mode but no trace rates given"),
                });
            }
        }
        if let Some(tc) = internal_fluid.trace_compounds() {
            if !trace_rates.is_empty() && trace_rates.len() != tc.len() {
                return Err(NetworkError::Initialization {
                    what: format!(
                        "{name}: {} trace rates do not match {} trace compounds",
                        trace_rates.len(),
                        tc.len()
                    ),
                });
            }
        }

        let mut core = LinkCore::new(name, vec![node], network_size);
        core.set_initialized();
        Ok(Self {
            core,
            flip_flow_sign: config.flip_flow_sign,
            trace_compounds_only: config.trace_compounds_only,
            flow_demand,
            malf_blockage_flag: false,
            malf_blockage_value: 0.0,
            internal_fluid,
            trace_rates,
            flow_rate: 0.0,
            flux: 0.0,
        })
    }

    pub fn flow_demand(&self) -> f64 {
        self.flow_demand
    }

    pub fn set_flow_demand(&mut self, demand: f64) {
        self.flow_demand = demand;
    }

    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    pub fn internal_fluid(&self) -> &Mixture {
        &self.internal_fluid
    }

    /// Activate or clear the blockage malfunction; the fraction is
    /// clamped to [0, 1].
    pub fn set_malf_blockage(&mut self, active: bool, value: f64) {
        self.malf_blockage_flag = active;
        self.malf_blockage_value = value.clamp(0.0, 1.0);
    }
}

impl Link<FluidNode> for SourceBoundary {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn step(&mut self, _dt: f64, _nodes: &mut [FluidNode]) -> NetworkResult<()> {
        self.core.apply_port_commands()?;

        self.flow_rate = self.flow_demand;
        if self.flip_flow_sign {
            self.flow_rate = -self.flow_rate;
        }
        if self.malf_blockage_flag {
            self.flow_rate *= 1.0 - self.malf_blockage_value;
        }

        // Molar flux into the node; zero in trace-only mode since the
        // bulk fluid is untouched.
        let mweight = self.internal_fluid.mweight();
        self.flux = if self.trace_compounds_only || mweight < f64::EPSILON {
            0.0
        } else {
            self.flow_rate / mweight
        };
        self.core.source[0] = self.flux;
        Ok(())
    }

    fn compute_flows(&mut self, _dt: f64, _nodes: &mut [FluidNode]) -> NetworkResult<()> {
        self.core.port_directions[0] = if self.flux.abs() > f64::EPSILON {
            PortDirection::Sink
        } else {
            PortDirection::None
        };
        Ok(())
    }

    fn transport_flows(&mut self, _dt: f64, nodes: &mut [FluidNode]) -> NetworkResult<()> {
        let node = &mut nodes[self.core.node_map[0]];

        if self.trace_compounds_only {
            // TC-only: per-compound rates go straight to the node.
            if self.flow_rate.abs() > f64::EPSILON {
                for (i, rate) in self.trace_rates.iter().enumerate() {
                    node.collect_trace_inflow(i, self.flow_rate * rate)?;
                }
            }
        } else {
            // TC mass rates ride the bulk mixture into the node.
            let flow = self.flow_rate;
            let mole_flow = flow / self.internal_fluid.mweight().max(f64::EPSILON);
            let rates = &self.trace_rates;
            if let Some(tc) = self.internal_fluid.trace_compounds_mut() {
                for (i, rate) in rates.iter().enumerate() {
                    tc.set_mass(i, flow * rate)?;
                }
                tc.update_mole_fractions(mole_flow);
            }
        }

        if !self.trace_compounds_only && self.flow_rate.abs() > TRANSPORT_LIMIT {
            self.internal_fluid.set_flow_rate(self.flow_rate);
            node.collect_influx(self.flow_rate, &self.internal_fluid)?;
        }
        Ok(())
    }
}

//! One-port fire source.

use crate::TRANSPORT_LIMIT;
use lpn_fluids::{FluidType, Mixture, Phase};
use lpn_network::{FluidNode, Link, LinkCore, NetworkError, NetworkResult, PortDirection};

/// Configuration of a [`FireSource`].
#[derive(Debug, Clone, Default)]
pub struct FireSourceConfig {
    /// O₂ mass consumed per Joule of fire energy output (kg/J).
    pub o2_consumption_rate: f64,
    /// CO₂ mass produced per Joule of fire energy output (kg/J).
    pub co2_production_rate: f64,
    /// H₂O mass produced per Joule of fire energy output (kg/J).
    pub h2o_production_rate: f64,
    /// Minimum O₂ partial pressure to sustain the fire (kPa).
    pub min_o2_pressure: f64,
    /// Per-trace-compound mass produced per Joule (kg/J).
    pub trace_rates: Vec<f64>,
}

/// A fire burning in the attached node's atmosphere: consumes O₂,
/// produces CO₂ and H₂O (plus optional trace compounds) at rates
/// proportional to the commanded heat output, and auto-extinguishes
/// when the node's O₂ partial pressure falls below the configured
/// minimum. Heat goes to the node's undamped heat-flux collector since
/// the injected bulk mixture is at node temperature.
#[derive(Debug, Clone)]
pub struct FireSource {
    core: LinkCore,
    malf_fire_flag: bool,
    /// Commanded heat output (W).
    malf_fire_heat: f64,
    malf_blockage_flag: bool,
    malf_blockage_value: f64,
    o2_consumption_rate: f64,
    co2_production_rate: f64,
    h2o_production_rate: f64,
    min_o2_pressure: f64,
    i_o2: usize,
    i_co2: usize,
    i_h2o: usize,
    flow_o2: f64,
    flow_co2: f64,
    flow_h2o: f64,
    flow_rate: f64,
    flux: f64,
    power: f64,
    internal_fluid: Mixture,
    trace_rates: Vec<f64>,
    trace_mass_rates: Vec<f64>,
}

impl FireSource {
    /// Build and validate the link against its attached node. The node
    /// must be a gas node whose mixture carries O₂, CO₂, and H₂O.
    pub fn new(
        name: &str,
        config: FireSourceConfig,
        node: usize,
        network_size: usize,
        nodes: &[FluidNode],
    ) -> NetworkResult<Self> {
        let attached = nodes.get(node).ok_or_else(|| NetworkError::Initialization {
            what: format!("{name}: port node {node} out of range {}", nodes.len()),
        })?;

        if (config.co2_production_rate + config.h2o_production_rate + config.o2_consumption_rate)
            .abs()
            < f64::EPSILON
        {
            return Err(NetworkError::Initialization {
                what: format!("{name}: sum of bulk fluid mass rates is zero"),
            });
        }
        if attached.content().phase() != Phase::Gas {
            return Err(NetworkError::Initialization {
                what: format!("{name}: cannot attach a fire source to a non-gas node"),
            });
        }

        let internal_fluid = attached.content().clone();
        let i_o2 = internal_fluid
            .find(FluidType::O2)
            .map_err(|_| missing(name, "O2"))?;
        let i_co2 = internal_fluid
            .find(FluidType::CO2)
            .map_err(|_| missing(name, "CO2"))?;
        let i_h2o = internal_fluid
            .find(FluidType::H2O)
            .map_err(|_| missing(name, "H2O"))?;

        let trace_len = internal_fluid.trace_compounds().map_or(0, |tc| tc.len());
        if !config.trace_rates.is_empty() && config.trace_rates.len() != trace_len {
            return Err(NetworkError::Initialization {
                what: format!(
                    "{name}: {} trace rates do not match {trace_len} trace compounds",
                    config.trace_rates.len()
                ),
            });
        }
        let trace_rates = if config.trace_rates.is_empty() {
            vec![0.0; trace_len]
        } else {
            config.trace_rates
        };

        let mut core = LinkCore::new(name, vec![node], network_size);
        core.set_initialized();
        Ok(Self {
            core,
            malf_fire_flag: false,
            malf_fire_heat: 0.0,
            malf_blockage_flag: false,
            malf_blockage_value: 0.0,
            o2_consumption_rate: config.o2_consumption_rate,
            co2_production_rate: config.co2_production_rate,
            h2o_production_rate: config.h2o_production_rate,
            min_o2_pressure: config.min_o2_pressure,
            i_o2,
            i_co2,
            i_h2o,
            flow_o2: 0.0,
            flow_co2: 0.0,
            flow_h2o: 0.0,
            flow_rate: 0.0,
            flux: 0.0,
            power: 0.0,
            internal_fluid,
            trace_rates,
            trace_mass_rates: vec![0.0; trace_len],
        })
    }

    /// Ignite or extinguish the fire at the given heat output (W).
    pub fn set_malf_fire(&mut self, active: bool, heat: f64) {
        self.malf_fire_flag = active;
        self.malf_fire_heat = heat;
    }

    pub fn is_burning(&self) -> bool {
        self.malf_fire_flag
    }

    pub fn set_malf_blockage(&mut self, active: bool, value: f64) {
        self.malf_blockage_flag = active;
        self.malf_blockage_value = value.clamp(0.0, 1.0);
    }

    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    fn zero_generation(&mut self) {
        self.flow_o2 = 0.0;
        self.flow_co2 = 0.0;
        self.flow_h2o = 0.0;
        self.flow_rate = 0.0;
        self.power = 0.0;
        self.trace_mass_rates.fill(0.0);
    }
}

fn missing(name: &str, species: &str) -> NetworkError {
    NetworkError::Initialization {
        what: format!("{name}: network fluid has no {species} constituent"),
    }
}

impl Link<FluidNode> for FireSource {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn step(&mut self, _dt: f64, nodes: &mut [FluidNode]) -> NetworkResult<()> {
        self.core.apply_port_commands()?;

        // Auto-extinguish on low oxygen.
        let node = &nodes[self.core.node_map[0]];
        if node.content().partial_pressure(FluidType::O2)? < self.min_o2_pressure {
            self.malf_fire_flag = false;
        }

        if self.malf_fire_flag {
            self.flow_co2 = self.co2_production_rate * self.malf_fire_heat;
            self.flow_o2 = -self.o2_consumption_rate * self.malf_fire_heat;
            self.flow_h2o = self.h2o_production_rate * self.malf_fire_heat;
            self.flow_rate = self.flow_co2 + self.flow_o2 + self.flow_h2o;
            for (mass_rate, rate) in self.trace_mass_rates.iter_mut().zip(&self.trace_rates) {
                *mass_rate = rate * self.malf_fire_heat;
            }
            self.power = self.malf_fire_heat;
        } else {
            self.zero_generation();
        }

        if self.malf_blockage_flag {
            let open = 1.0 - self.malf_blockage_value;
            self.flow_rate *= open;
            self.flow_o2 *= open;
            self.flow_co2 *= open;
            self.flow_h2o *= open;
        }

        let mweight = self.internal_fluid.mweight();
        self.flux = if mweight > f64::EPSILON {
            self.flow_rate / mweight
        } else {
            0.0
        };
        self.core.source[0] = self.flux;
        Ok(())
    }

    fn compute_flows(&mut self, _dt: f64, _nodes: &mut [FluidNode]) -> NetworkResult<()> {
        self.core.port_directions[0] = if self.flux > f64::EPSILON {
            PortDirection::Sink
        } else {
            PortDirection::None
        };
        Ok(())
    }

    fn transport_flows(&mut self, _dt: f64, nodes: &mut [FluidNode]) -> NetworkResult<()> {
        let node = &mut nodes[self.core.node_map[0]];

        if self.malf_fire_flag {
            // Rebuild the generated mixture from the constituent rates;
            // the bulk is injected at node temperature.
            self.internal_fluid.reset_state();
            self.internal_fluid.set_constituent_mass(self.i_o2, self.flow_o2)?;
            self.internal_fluid
                .set_constituent_mass(self.i_co2, self.flow_co2)?;
            self.internal_fluid
                .set_constituent_mass(self.i_h2o, self.flow_h2o)?;
            self.internal_fluid.update_mass();
            let mole = self.internal_fluid.mole();
            let rates = &self.trace_mass_rates;
            if let Some(tc) = self.internal_fluid.trace_compounds_mut() {
                for (i, rate) in rates.iter().enumerate() {
                    tc.set_mass(i, *rate)?;
                }
                tc.update_mole_fractions(mole);
            }
            self.internal_fluid
                .set_temperature(node.content().temperature());
        } else {
            self.zero_generation();
        }

        if self.flow_rate.abs() > TRANSPORT_LIMIT {
            self.internal_fluid.set_flow_rate(self.flow_rate);
            node.collect_influx(self.flow_rate, &self.internal_fluid)?;
        }

        // Heat bypasses the bulk-mixture temperature path.
        node.collect_heat_flux(self.power);
        Ok(())
    }
}

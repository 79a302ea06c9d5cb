//! Fluid network node: a basic node plus contained fluid and transport
//! bookkeeping.

use crate::error::{NetworkError, NetworkResult};
use crate::node::{NodeCore, SolverNode};
use lpn_core::ensure_finite;
use lpn_fluids::Mixture;
use serde::{Deserialize, Serialize};

/// A node holding a composite fluid. The potential is the node pressure
/// in kPa.
///
/// Incident links collect bulk flow into the inflow-mixing fluid, trace
/// flow into the per-compound accumulator, and heat into the undamped
/// heat-flux collector; `integrate_flows` folds all of it into the
/// contained fluid after the network converges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidNode {
    core: NodeCore,
    content: Mixture,
    inflow: Mixture,
    volume: f64,
    /// Non-fluid mass thermally lumped with the contents (tank walls,
    /// equipment); damps temperature swings from incoming flow.
    thermal_damping_mass: f64,
    /// Fraction [0-1] of isentropic expansion cooling applied on pressure
    /// drops.
    expansion_scale_factor: f64,
    /// Heat collected outside the bulk-mixture temperature path (W).
    undamped_heat_flux: f64,
    /// Fractional margin of contents an outflow may exceed before the
    /// step is flagged as an overflow.
    overflow_threshold: f64,
    overflow_count: u64,
    /// Per-compound trace inflow accumulator (kg/s), parallel to the
    /// content's trace-compound config.
    trace_inflow: Vec<f64>,
}

impl FluidNode {
    /// Create a fluid node. The initial potential is the content pressure;
    /// the inflow-mixing fluid starts as a zeroed copy of the content.
    pub fn new(name: &str, volume: f64, content: Mixture) -> Self {
        let mut inflow = content.clone();
        inflow.reset_state();
        let trace_len = content.trace_compounds().map_or(0, |tc| tc.len());
        Self {
            core: NodeCore::new(name, content.pressure()),
            content,
            inflow,
            volume,
            thermal_damping_mass: 0.0,
            expansion_scale_factor: 0.0,
            undamped_heat_flux: 0.0,
            overflow_threshold: 1.0e-6,
            overflow_count: 0,
            trace_inflow: vec![0.0; trace_len],
        }
    }

    pub fn with_thermal_damping_mass(mut self, mass: f64) -> Self {
        self.thermal_damping_mass = mass;
        self
    }

    pub fn with_expansion_scale_factor(mut self, scale: f64) -> Self {
        self.expansion_scale_factor = scale.clamp(0.0, 1.0);
        self
    }

    pub fn content(&self) -> &Mixture {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Mixture {
        &mut self.content
    }

    pub fn inflow(&self) -> &Mixture {
        &self.inflow
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn undamped_heat_flux(&self) -> f64 {
        self.undamped_heat_flux
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    pub fn trace_inflow(&self, index: usize) -> NetworkResult<f64> {
        self.trace_inflow
            .get(index)
            .copied()
            .ok_or_else(|| NetworkError::OutOfBounds {
                what: format!(
                    "trace inflow index {index} out of range {}",
                    self.trace_inflow.len()
                ),
            })
    }

    /// Collect a bulk flow into (positive) or out of (negative) this node.
    /// The incoming mixture defines the mixture of the transferred mass.
    pub fn collect_influx(&mut self, rate: f64, fluid: &Mixture) -> NetworkResult<()> {
        self.inflow.add_state(fluid, Some(rate))?;
        self.core.collect_influx_rate(rate);
        Ok(())
    }

    /// Collect a trace-compound flow rate directly, bypassing the bulk.
    pub fn collect_trace_inflow(&mut self, index: usize, rate: f64) -> NetworkResult<()> {
        let len = self.trace_inflow.len();
        *self
            .trace_inflow
            .get_mut(index)
            .ok_or_else(|| NetworkError::OutOfBounds {
                what: format!("trace inflow index {index} out of range {len}"),
            })? += rate;
        Ok(())
    }

    /// Collect heat delivered outside the bulk-mixture temperature path.
    pub fn collect_heat_flux(&mut self, power: f64) {
        self.undamped_heat_flux += power;
    }
}

impl SolverNode for FluidNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn validate(&self) -> NetworkResult<()> {
        if !self.core.is_initialized() {
            return Err(NetworkError::Initialization {
                what: "fluid node has no name".into(),
            });
        }
        if self.volume < 0.0 {
            return Err(NetworkError::Initialization {
                what: format!("fluid node {} has negative volume", self.core.name()),
            });
        }
        if self.content.mass() < 0.0 {
            return Err(NetworkError::Initialization {
                what: format!("fluid node {} has negative content mass", self.core.name()),
            });
        }
        ensure_finite(self.content.temperature(), "fluid node temperature").map_err(|e| {
            NetworkError::Initialization {
                what: e.to_string(),
            }
        })?;
        Ok(())
    }

    fn reset_flows(&mut self) {
        self.core.reset_flows();
        self.inflow.reset_state();
        self.trace_inflow.fill(0.0);
        self.undamped_heat_flux = 0.0;
    }

    fn reset_content_state(&mut self) {
        self.content.reset_state();
    }

    fn integrate_flows(&mut self, dt: f64) -> NetworkResult<()> {
        self.core.update_derived_flux();
        let influx = self.core.influx_rate();
        let outflux = self.core.outflux_rate();

        let mass_in = influx * dt;
        let mass_out = outflux * dt;
        let mass_old = self.content.mass();

        // Overflow: a step that drains more than the node holds.
        if mass_out > (mass_old + mass_in.max(0.0)) * (1.0 + self.overflow_threshold)
            && mass_out > f64::EPSILON
        {
            self.overflow_count += 1;
        }

        // Constituent mass bookkeeping: inflow at the incoming mixture,
        // outflow at the contained mixture.
        let mixing = influx.abs() > f64::EPSILON || outflux.abs() > f64::EPSILON;
        if mixing {
            for i in 0..self.content.n_constituents() {
                let w_old = self.content.constituent(i)?.mass_fraction;
                let w_in = self.inflow.constituent(i)?.mass_fraction;
                let mass_i =
                    (self.content.constituent(i)?.fluid.mass + mass_in * w_in - mass_out * w_old)
                        .max(0.0);
                self.content.set_constituent_mass(i, mass_i)?;
            }
            self.content.update_mass();
        }

        // Energy balance: thermal damping mass rides the contents; the
        // undamped heat flux bypasses the mixture enthalpy path.
        let cp_content = self.content.specific_heat();
        let damped_heat_cap = (self.content.mass() + self.thermal_damping_mass) * cp_content;
        let mut temperature = self.content.temperature();
        if mass_in > f64::EPSILON {
            let cp_in = self.inflow.specific_heat();
            let total_cap = damped_heat_cap + mass_in * cp_in;
            if total_cap > f64::EPSILON {
                temperature = (damped_heat_cap * temperature
                    + mass_in * cp_in * self.inflow.temperature())
                    / total_cap;
            }
        }
        if damped_heat_cap > f64::EPSILON {
            temperature += self.undamped_heat_flux * dt / damped_heat_cap;
        }

        // Expansion cooling on a falling potential.
        let p_old = self.content.pressure();
        let p_new = self.core.potential();
        if self.expansion_scale_factor > 0.0
            && p_old > f64::EPSILON
            && p_new > f64::EPSILON
            && p_new < p_old
        {
            let gamma = self.content.adiabatic_index();
            if gamma > 1.0 {
                let isentropic = (p_new / p_old).powf((gamma - 1.0) / gamma);
                temperature *= 1.0 - self.expansion_scale_factor * (1.0 - isentropic);
            }
        }

        self.content.edit(temperature, p_new);

        // Trace compounds: direct inflow plus whatever rode the bulk.
        let bulk_trace: Vec<f64> = match self.inflow.trace_compounds() {
            Some(tc) => (0..tc.len())
                .map(|i| tc.mass(i).unwrap_or(0.0))
                .collect(),
            None => Vec::new(),
        };
        let mole = self.content.mole();
        if let Some(tc) = self.content.trace_compounds_mut() {
            for i in 0..tc.len() {
                let ride = bulk_trace.get(i).copied().unwrap_or(0.0);
                let direct = self.trace_inflow.get(i).copied().unwrap_or(0.0);
                tc.add_mass(i, dt * (ride + direct))?;
            }
            tc.update_mole_fractions(mole);
        }

        Ok(())
    }

    fn restart(&mut self) -> NetworkResult<()> {
        // Re-derive content properties from the checkpointed state.
        let t = self.content.temperature();
        let p = self.content.pressure();
        self.content.edit(t, p);
        self.inflow.reset_state();
        self.trace_inflow.fill(0.0);
        self.undamped_heat_flux = 0.0;
        Ok(())
    }
}

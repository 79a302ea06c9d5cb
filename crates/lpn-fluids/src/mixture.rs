//! Composite fluid: an ordered set of constituents with derived
//! thermophysical properties.
//!
//! Invariants held by every successful constructor and mutator:
//! - mass fractions sum to 1 within [`FRACTION_TOLERANCE`]
//! - mole fractions sum to 1 within the same tolerance
//! - mass = moles · molecular weight
//! - all constituents share the composite phase

use crate::error::{FluidError, FluidResult};
use crate::mono::MonoFluid;
use crate::properties::PropertyModel;
use crate::species::{FluidType, Phase};
use crate::trace::{TraceCompounds, TraceCompoundsConfig};
use lpn_core::ensure_finite;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fraction normalization threshold. Input fraction arrays whose sum
/// deviates from 1 by more than this are rejected rather than repaired.
pub const FRACTION_TOLERANCE: f64 = 1.0e-10;

/// Static configuration of a mixture: the property registry, the ordered
/// constituent types, and the optional trace-compound config.
#[derive(Debug, Clone)]
pub struct MixtureConfig {
    pub properties: Arc<dyn PropertyModel>,
    pub types: Vec<FluidType>,
    pub trace: Option<TraceCompoundsConfig>,
}

impl MixtureConfig {
    pub fn new(properties: Arc<dyn PropertyModel>, types: &[FluidType]) -> Self {
        Self {
            properties,
            types: types.to_vec(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: TraceCompoundsConfig) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// Initial state of a mixture.
#[derive(Debug, Clone, Default)]
pub struct MixtureInput {
    /// Temperature (K).
    pub temperature: f64,
    /// Total pressure (kPa).
    pub pressure: f64,
    /// Mass flow rate (kg/s).
    pub flow_rate: f64,
    /// Mass (kg).
    pub mass: f64,
    /// Constituent mass fractions, same order and length as the config types.
    pub mass_fractions: Vec<f64>,
    /// Optional initial trace-compound mole fractions.
    pub trace_mole_fractions: Option<Vec<f64>>,
}

/// One constituent of a mixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constituent {
    pub fluid_type: FluidType,
    pub mass_fraction: f64,
    pub mole_fraction: f64,
    pub fluid: MonoFluid,
}

/// A multi-species fluid: composite state plus per-constituent shares
/// and derived properties, with an optional trace-compound sub-mixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mixture {
    #[serde(skip, default = "default_properties")]
    properties: Arc<dyn PropertyModel>,
    temperature: f64,
    pressure: f64,
    flow_rate: f64,
    mass: f64,
    mole: f64,
    constituents: Vec<Constituent>,
    mweight: f64,
    density: f64,
    viscosity: f64,
    specific_heat: f64,
    specific_enthalpy: f64,
    thermal_conductivity: f64,
    prandtl_number: f64,
    adiabatic_index: f64,
    phase: Phase,
    trace: Option<TraceCompounds>,
}

fn default_properties() -> Arc<dyn PropertyModel> {
    Arc::new(crate::properties::StandardProperties)
}

impl Mixture {
    /// Build and validate a mixture from configuration and input data.
    pub fn new(config: &MixtureConfig, input: &MixtureInput) -> FluidResult<Self> {
        if config.types.is_empty() {
            return Err(FluidError::Initialization {
                what: "mixture must have at least one constituent".into(),
            });
        }
        if input.mass_fractions.len() != config.types.len() {
            return Err(FluidError::Initialization {
                what: format!(
                    "mass fraction count {} does not match constituent count {}",
                    input.mass_fractions.len(),
                    config.types.len()
                ),
            });
        }

        for (value, what) in [
            (input.temperature, "mixture temperature"),
            (input.pressure, "mixture pressure"),
            (input.flow_rate, "mixture flow rate"),
            (input.mass, "mixture mass"),
        ] {
            ensure_finite(value, what).map_err(|e| FluidError::Initialization {
                what: e.to_string(),
            })?;
        }

        let phase = composite_phase(&config.types, &input.mass_fractions)?;
        let fractions = normalized_fractions(&input.mass_fractions)?;

        let mut constituents: Vec<Constituent> = config
            .types
            .iter()
            .zip(&fractions)
            .map(|(ty, w)| Constituent {
                fluid_type: *ty,
                mass_fraction: *w,
                mole_fraction: 0.0,
                fluid: MonoFluid::default(),
            })
            .collect();

        let (mweight, mole_fractions) = fractions_to_moles(&config.types, &fractions)?;
        for (constituent, x) in constituents.iter_mut().zip(&mole_fractions) {
            constituent.mole_fraction = *x;
        }

        let trace = match &config.trace {
            Some(tc_config) => Some(TraceCompounds::new(
                tc_config.clone(),
                input.trace_mole_fractions.as_deref(),
            )?),
            None => None,
        };

        let mut mixture = Self {
            properties: config.properties.clone(),
            temperature: input.temperature,
            pressure: input.pressure,
            flow_rate: input.flow_rate,
            mass: input.mass,
            mole: input.mass / mweight,
            constituents,
            mweight,
            density: 0.0,
            viscosity: 0.0,
            specific_heat: 0.0,
            specific_enthalpy: 0.0,
            thermal_conductivity: 0.0,
            prandtl_number: 0.0,
            adiabatic_index: 0.0,
            phase,
            trace,
        };
        mixture.apportion_mass();
        mixture.apportion_flow();
        mixture.derive();
        Ok(mixture)
    }

    // --- composite state getters ---

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn mole(&self) -> f64 {
        self.mole
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn n_constituents(&self) -> usize {
        self.constituents.len()
    }

    pub fn constituent(&self, index: usize) -> FluidResult<&Constituent> {
        self.constituents.get(index).ok_or_else(|| FluidError::OutOfBounds {
            what: format!(
                "constituent index {index} out of range {}",
                self.constituents.len()
            ),
        })
    }

    pub fn fluid_type(&self, index: usize) -> FluidResult<FluidType> {
        Ok(self.constituent(index)?.fluid_type)
    }

    /// Index of a constituent type, or an out-of-bounds error if absent.
    pub fn find(&self, ty: FluidType) -> FluidResult<usize> {
        self.constituents
            .iter()
            .position(|c| c.fluid_type == ty)
            .ok_or_else(|| FluidError::OutOfBounds {
                what: format!("fluid type {} not a constituent", ty.key()),
            })
    }

    pub fn mass_fraction(&self, ty: FluidType) -> FluidResult<f64> {
        Ok(self.constituents[self.find(ty)?].mass_fraction)
    }

    pub fn mole_fraction(&self, ty: FluidType) -> FluidResult<f64> {
        Ok(self.constituents[self.find(ty)?].mole_fraction)
    }

    pub fn partial_pressure(&self, ty: FluidType) -> FluidResult<f64> {
        Ok(self.constituents[self.find(ty)?].fluid.pressure)
    }

    pub fn trace_compounds(&self) -> Option<&TraceCompounds> {
        self.trace.as_ref()
    }

    pub fn trace_compounds_mut(&mut self) -> Option<&mut TraceCompounds> {
        self.trace.as_mut()
    }

    // --- derived property getters ---

    pub fn mweight(&self) -> f64 {
        self.mweight
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn viscosity(&self) -> f64 {
        self.viscosity
    }

    pub fn specific_heat(&self) -> f64 {
        self.specific_heat
    }

    pub fn specific_enthalpy(&self) -> f64 {
        self.specific_enthalpy
    }

    pub fn thermal_conductivity(&self) -> f64 {
        self.thermal_conductivity
    }

    pub fn prandtl_number(&self) -> f64 {
        self.prandtl_number
    }

    pub fn adiabatic_index(&self) -> f64 {
        self.adiabatic_index
    }

    // --- mutators ---

    /// Set the composite flow rate, apportioned to constituents by mass
    /// fraction.
    pub fn set_flow_rate(&mut self, flow_rate: f64) {
        self.flow_rate = flow_rate;
        self.apportion_flow();
    }

    /// Set the composite mass; moles follow from the molecular weight and
    /// trace-compound masses scale by the same ratio.
    pub fn set_mass(&mut self, mass: f64) {
        let old_mass = self.mass;
        self.mass = mass;
        self.mole = mass / self.mweight.max(f64::EPSILON);
        self.apportion_mass();
        if let Some(trace) = &mut self.trace {
            if old_mass.abs() > f64::EPSILON {
                trace.scale_masses(mass / old_mass);
            }
        }
    }

    /// Set the composite moles; mass follows from the molecular weight.
    pub fn set_mole(&mut self, mole: f64) {
        self.mole = mole;
        self.mass = mole * self.mweight;
        self.apportion_mass();
    }

    /// Set a new mass together with new mass fractions. The fractions are
    /// validated and normalized; mole fractions, molecular weight, and
    /// derived properties are recomputed.
    pub fn set_mass_and_mass_fractions(
        &mut self,
        mass: f64,
        mass_fractions: &[f64],
    ) -> FluidResult<()> {
        if mass_fractions.len() != self.constituents.len() {
            return Err(FluidError::OutOfBounds {
                what: format!(
                    "mass fraction count {} does not match constituent count {}",
                    mass_fractions.len(),
                    self.constituents.len()
                ),
            });
        }
        let fractions = normalized_fractions(mass_fractions)?;
        let types: Vec<FluidType> = self.constituents.iter().map(|c| c.fluid_type).collect();
        let (mweight, mole_fractions) = fractions_to_moles(&types, &fractions)?;
        for (constituent, (w, x)) in self
            .constituents
            .iter_mut()
            .zip(fractions.iter().zip(&mole_fractions))
        {
            constituent.mass_fraction = *w;
            constituent.mole_fraction = *x;
        }
        self.mweight = mweight;
        self.mass = mass;
        self.mole = mass / mweight;
        self.apportion_mass();
        self.derive();
        Ok(())
    }

    /// Symmetric version of [`Self::set_mass_and_mass_fractions`] starting
    /// from moles and mole fractions.
    pub fn set_mole_and_mole_fractions(
        &mut self,
        mole: f64,
        mole_fractions: &[f64],
    ) -> FluidResult<()> {
        if mole_fractions.len() != self.constituents.len() {
            return Err(FluidError::OutOfBounds {
                what: format!(
                    "mole fraction count {} does not match constituent count {}",
                    mole_fractions.len(),
                    self.constituents.len()
                ),
            });
        }
        let fractions = normalized_fractions(mole_fractions)?;
        let mweight: f64 = self
            .constituents
            .iter()
            .zip(&fractions)
            .map(|(c, x)| x * c.fluid_type.molar_mass())
            .sum();
        if mweight.abs() < f64::EPSILON {
            return Err(FluidError::Numerical {
                what: "mole fractions yield zero molecular weight".into(),
            });
        }
        for (constituent, x) in self.constituents.iter_mut().zip(&fractions) {
            constituent.mole_fraction = *x;
            constituent.mass_fraction = x * constituent.fluid_type.molar_mass() / mweight;
        }
        self.mweight = mweight;
        self.mole = mole;
        self.mass = mole * mweight;
        self.apportion_mass();
        self.derive();
        Ok(())
    }

    /// Set the composite temperature and re-derive all properties.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
        self.derive();
    }

    /// Set the composite total pressure and re-derive all properties.
    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
        self.derive();
    }

    /// Set a single constituent's mass without updating composite totals.
    /// Call [`Self::update_mass`] afterwards to re-establish invariants.
    pub fn set_constituent_mass(&mut self, index: usize, mass: f64) -> FluidResult<()> {
        let len = self.constituents.len();
        self.constituents
            .get_mut(index)
            .ok_or_else(|| FluidError::OutOfBounds {
                what: format!("constituent index {index} out of range {len}"),
            })?
            .fluid
            .mass = mass;
        Ok(())
    }

    /// Recompute composite mass, moles, fractions, and properties from the
    /// current constituent masses.
    pub fn update_mass(&mut self) {
        let mass: f64 = self.constituents.iter().map(|c| c.fluid.mass).sum();
        let mole: f64 = self
            .constituents
            .iter()
            .map(|c| c.fluid.mass / c.fluid_type.molar_mass())
            .sum();
        self.mass = mass;
        self.mole = mole;
        if mass.abs() < f64::EPSILON || mole.abs() < f64::EPSILON {
            // Degenerate totals: leave the fractions alone so an all-zero
            // update does not destroy the composition.
            return;
        }
        self.mweight = mass / mole;
        for constituent in &mut self.constituents {
            constituent.mass_fraction = constituent.fluid.mass / mass;
            constituent.mole_fraction =
                constituent.fluid.mass / constituent.fluid_type.molar_mass() / mole;
            constituent.fluid.mole = constituent.fluid.mass / constituent.fluid_type.molar_mass();
        }
        self.derive();
    }

    /// Zero the entire state: scalars, constituent shares, derived
    /// properties, and trace compounds. Fractions are cleared too, so the
    /// mixture must be re-seeded (e.g. by `set_state`) before use.
    pub fn reset_state(&mut self) {
        self.temperature = 0.0;
        self.pressure = 0.0;
        self.flow_rate = 0.0;
        self.mass = 0.0;
        self.mole = 0.0;
        self.mweight = 0.0;
        self.density = 0.0;
        self.viscosity = 0.0;
        self.specific_heat = 0.0;
        self.specific_enthalpy = 0.0;
        self.thermal_conductivity = 0.0;
        self.prandtl_number = 0.0;
        self.adiabatic_index = 0.0;
        for constituent in &mut self.constituents {
            constituent.mass_fraction = 0.0;
            constituent.mole_fraction = 0.0;
            constituent.fluid.reset();
        }
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
    }

    /// Deep-copy the state of a compatible mixture (same constituent
    /// types in the same order).
    pub fn set_state(&mut self, other: &Mixture) -> FluidResult<()> {
        self.check_compatible(other)?;
        self.temperature = other.temperature;
        self.pressure = other.pressure;
        self.flow_rate = other.flow_rate;
        self.mass = other.mass;
        self.mole = other.mole;
        self.mweight = other.mweight;
        self.density = other.density;
        self.viscosity = other.viscosity;
        self.specific_heat = other.specific_heat;
        self.specific_enthalpy = other.specific_enthalpy;
        self.thermal_conductivity = other.thermal_conductivity;
        self.prandtl_number = other.prandtl_number;
        self.adiabatic_index = other.adiabatic_index;
        self.phase = other.phase;
        self.constituents.clone_from(&other.constituents);
        if let (Some(trace), Some(other_trace)) = (&mut self.trace, &other.trace) {
            trace.set_state(other_trace)?;
        }
        Ok(())
    }

    /// Mix another mixture's flow stream into this one.
    ///
    /// Extensive quantities (constituent mass flows, hence mass fractions)
    /// combine mass-weighted; intensive quantities (pressure) combine
    /// mole-weighted; the combined temperature conserves enthalpy flux:
    /// (ṁ₁+ṁ₂)·h₁₂ = ṁ₁·h₁ + ṁ₂·h₂. Opposite-sign flows are permitted.
    ///
    /// `override_flow_rate` replaces `other`'s flow rate when given.
    pub fn add_state(&mut self, other: &Mixture, override_flow_rate: Option<f64>) -> FluidResult<()> {
        self.check_compatible(other)?;
        let flow1 = self.flow_rate;
        let flow2 = override_flow_rate.unwrap_or(other.flow_rate);
        let total = flow1 + flow2;
        if total.abs() < f64::EPSILON {
            return Err(FluidError::Numerical {
                what: "combined flow rate is zero".into(),
            });
        }

        // Constituent mass flows combine directly; fractions follow.
        let mut mole_flow_total = 0.0;
        let mut mass_fractions = Vec::with_capacity(self.constituents.len());
        let mut mole_flows = Vec::with_capacity(self.constituents.len());
        for (mine, theirs) in self.constituents.iter().zip(&other.constituents) {
            let mdot = flow1 * mine.mass_fraction + flow2 * theirs.mass_fraction;
            let ndot = mdot / mine.fluid_type.molar_mass();
            mass_fractions.push(mdot / total);
            mole_flows.push(ndot);
            mole_flow_total += ndot;
        }
        if mole_flow_total.abs() < f64::EPSILON {
            return Err(FluidError::Numerical {
                what: "combined molar flow rate is zero".into(),
            });
        }
        let mweight = total / mole_flow_total;

        // Mole-weighted intensive mixing uses each stream's molar flow.
        let n1 = if self.mweight.abs() > f64::EPSILON {
            flow1 / self.mweight
        } else {
            0.0
        };
        let n2 = if other.mweight.abs() > f64::EPSILON {
            flow2 / other.mweight
        } else {
            0.0
        };
        let pressure = if (n1 + n2).abs() > f64::EPSILON {
            (n1 * self.pressure + n2 * other.pressure) / (n1 + n2)
        } else {
            self.pressure
        };

        // Enthalpy flux conservation fixes the combined temperature.
        let enthalpy = (flow1 * self.specific_enthalpy + flow2 * other.specific_enthalpy) / total;

        for (constituent, (w, ndot)) in self
            .constituents
            .iter_mut()
            .zip(mass_fractions.iter().zip(&mole_flows))
        {
            constituent.mass_fraction = *w;
            constituent.mole_fraction = ndot / mole_flow_total;
        }
        self.mweight = mweight;
        self.pressure = pressure;
        self.flow_rate = total;
        self.mole = self.mass / mweight;
        self.apportion_mass();
        self.apportion_flow();
        self.temperature = self.invert_temperature(enthalpy, pressure)?;

        // Trace compounds ride the incoming stream's molar flow.
        if let (Some(trace), Some(other_trace)) = (&mut self.trace, &other.trace) {
            let other_mole_flow = if other.mweight.abs() > f64::EPSILON {
                flow2 / other.mweight
            } else {
                0.0
            };
            for i in 0..trace.len() {
                let compound = trace.config().compound(i)?;
                let added =
                    other_mole_flow * other_trace.mole_fraction(i)? * compound.molar_mass();
                trace.add_mass(i, added)?;
            }
            let mole = self.mole;
            trace.update_mole_fractions(mole);
        }

        self.derive();
        Ok(())
    }

    /// Set temperature and total pressure together; partial pressures
    /// redistribute by mole fraction.
    pub fn edit(&mut self, temperature: f64, pressure: f64) {
        self.temperature = temperature;
        self.pressure = pressure;
        self.derive();
    }

    /// Set temperature and per-constituent partial pressures; the total
    /// pressure becomes their sum and the composition follows from the
    /// partial-pressure ratios.
    pub fn edit_partial_pressures(
        &mut self,
        temperature: f64,
        partial_pressures: &[f64],
    ) -> FluidResult<()> {
        if partial_pressures.len() != self.constituents.len() {
            return Err(FluidError::OutOfBounds {
                what: format!(
                    "partial pressure count {} does not match constituent count {}",
                    partial_pressures.len(),
                    self.constituents.len()
                ),
            });
        }
        let total: f64 = partial_pressures.iter().sum();
        if total.abs() < f64::EPSILON {
            return Err(FluidError::Numerical {
                what: "partial pressures sum to zero".into(),
            });
        }
        let mole_fractions: Vec<f64> = partial_pressures.iter().map(|p| p / total).collect();
        let mole = self.mole;
        self.set_mole_and_mole_fractions(mole, &mole_fractions)?;
        self.temperature = temperature;
        self.pressure = total;
        self.derive();
        Ok(())
    }

    // --- consistency queries (no mutation) ---

    /// Invert the specific-enthalpy relation for the current composition
    /// and pressure.
    pub fn compute_temperature(&self, specific_enthalpy: f64) -> FluidResult<f64> {
        self.invert_temperature(specific_enthalpy, self.pressure)
    }

    /// Specific enthalpy h = T·cp at the given temperature and optional
    /// pressure (current pressure when absent).
    pub fn compute_specific_enthalpy(&self, temperature: f64, pressure: Option<f64>) -> f64 {
        let p = pressure.unwrap_or(self.pressure);
        temperature * self.composition_specific_heat(temperature, p)
    }

    /// Density of the current composition at the given state.
    pub fn compute_density(&self, temperature: f64, pressure: f64) -> f64 {
        let mut density = 0.0;
        for constituent in &self.constituents {
            let partial = constituent.mole_fraction * pressure;
            let rho = self
                .properties
                .density(constituent.fluid_type, temperature, partial);
            density += match self.phase {
                Phase::Gas => rho,
                _ => constituent.mole_fraction * rho,
            };
        }
        density
    }

    /// Inverse of [`Self::compute_density`] for the current composition.
    pub fn compute_pressure(&self, temperature: f64, density: f64) -> FluidResult<f64> {
        let unit_density = self.compute_density(temperature, 1.0);
        if unit_density.abs() < f64::EPSILON {
            return Err(FluidError::Numerical {
                what: "density is independent of pressure for this composition".into(),
            });
        }
        Ok(density / unit_density)
    }

    // --- internal helpers ---

    fn check_compatible(&self, other: &Mixture) -> FluidResult<()> {
        if self.constituents.len() != other.constituents.len()
            || self
                .constituents
                .iter()
                .zip(&other.constituents)
                .any(|(a, b)| a.fluid_type != b.fluid_type)
        {
            return Err(FluidError::OutOfBounds {
                what: "constituent types do not match".into(),
            });
        }
        Ok(())
    }

    fn apportion_mass(&mut self) {
        for constituent in &mut self.constituents {
            constituent.fluid.mass = constituent.mass_fraction * self.mass;
            constituent.fluid.mole = constituent.mole_fraction * self.mole;
        }
    }

    fn apportion_flow(&mut self) {
        for constituent in &mut self.constituents {
            constituent.fluid.flow_rate = constituent.mass_fraction * self.flow_rate;
        }
    }

    fn composition_specific_heat(&self, temperature: f64, pressure: f64) -> f64 {
        self.constituents
            .iter()
            .map(|c| {
                let partial = c.mole_fraction * pressure;
                c.mass_fraction
                    * self
                        .properties
                        .specific_heat(c.fluid_type, temperature, partial)
            })
            .sum()
    }

    fn invert_temperature(&self, enthalpy: f64, pressure: f64) -> FluidResult<f64> {
        let mut t = if self.temperature > f64::EPSILON {
            self.temperature
        } else {
            300.0
        };
        for _ in 0..50 {
            let cp = self.composition_specific_heat(t, pressure);
            if cp.abs() < f64::EPSILON {
                return Err(FluidError::Numerical {
                    what: "specific heat vanished while inverting enthalpy".into(),
                });
            }
            let next = enthalpy / cp;
            if (next - t).abs() <= 1e-12 * next.abs().max(1.0) {
                return Ok(next);
            }
            t = next;
        }
        Ok(t)
    }

    /// Recompute partial pressures, constituent states, and all derived
    /// composite properties at the current (T, P, composition).
    fn derive(&mut self) {
        let t = self.temperature;
        let mut density = 0.0;
        let mut viscosity = 0.0;
        let mut specific_heat = 0.0;
        let mut conductivity = 0.0;
        let mut prandtl = 0.0;
        let mut gamma = 0.0;

        for constituent in &mut self.constituents {
            let ty = constituent.fluid_type;
            let partial = constituent.mole_fraction * self.pressure;
            constituent.fluid.temperature = t;
            constituent.fluid.pressure = partial;

            let rho = self.properties.density(ty, t, partial);
            let mu = self.properties.viscosity(ty, t, partial);
            let cp = self.properties.specific_heat(ty, t, partial);
            let k = self.properties.thermal_conductivity(ty, t, partial);
            constituent.fluid.density = rho;

            density += match self.phase {
                Phase::Gas => rho,
                _ => constituent.mole_fraction * rho,
            };
            viscosity += constituent.mole_fraction * mu;
            specific_heat += constituent.mass_fraction * cp;
            conductivity += constituent.mole_fraction * k;
            gamma += constituent.mole_fraction * self.properties.adiabatic_index(ty, t, partial);
            if k.abs() > f64::EPSILON {
                prandtl += constituent.mole_fraction * mu * cp / k;
            }
        }

        self.density = density;
        self.viscosity = viscosity;
        self.specific_heat = specific_heat;
        self.specific_enthalpy = t * specific_heat;
        self.thermal_conductivity = conductivity;
        self.prandtl_number = prandtl;
        self.adiabatic_index = gamma;
    }
}

/// Composite phase: the phase of the first constituent with a non-zero
/// fraction; any other non-zero constituent of a different phase is a
/// mixed-phase initialization error.
fn composite_phase(types: &[FluidType], fractions: &[f64]) -> FluidResult<Phase> {
    let mut phase = None;
    for (ty, fraction) in types.iter().zip(fractions) {
        if fraction.abs() > 0.0 {
            match phase {
                None => phase = Some(ty.phase()),
                Some(p) if p != ty.phase() => {
                    return Err(FluidError::Initialization {
                        what: "constituents have mixed phases".into(),
                    })
                }
                _ => {}
            }
        }
    }
    phase.ok_or_else(|| FluidError::Initialization {
        what: "all constituent fractions are zero".into(),
    })
}

/// Validate that fractions sum to 1 within tolerance, then normalize.
fn normalized_fractions(fractions: &[f64]) -> FluidResult<Vec<f64>> {
    let sum: f64 = fractions.iter().sum();
    if (sum - 1.0).abs() > FRACTION_TOLERANCE {
        return Err(FluidError::Initialization {
            what: format!("fractions sum to {sum}, outside tolerance of 1"),
        });
    }
    Ok(fractions.iter().map(|w| w / sum).collect())
}

/// Convert mass fractions to mole fractions and the composite molecular
/// weight: x_i = (w_i/MW_i) / Σ(w_j/MW_j), MW = 1/Σ(w_j/MW_j).
fn fractions_to_moles(types: &[FluidType], fractions: &[f64]) -> FluidResult<(f64, Vec<f64>)> {
    let mut denom = 0.0;
    let mut per_type = Vec::with_capacity(types.len());
    for (ty, w) in types.iter().zip(fractions) {
        let term = w / ty.molar_mass();
        per_type.push(term);
        denom += term;
    }
    if denom.abs() < f64::EPSILON {
        return Err(FluidError::Initialization {
            what: "composition yields zero molecular weight".into(),
        });
    }
    let mweight = 1.0 / denom;
    Ok((mweight, per_type.iter().map(|n| n / denom).collect()))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::properties::StandardProperties;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn constructed_fractions_always_sum_to_one(w0 in 0.01_f64..0.99_f64) {
            let config = MixtureConfig::new(
                Arc::new(StandardProperties),
                &[FluidType::N2, FluidType::O2],
            );
            let fluid = Mixture::new(&config, &MixtureInput {
                temperature: 300.0,
                pressure: 100.0,
                mass: 1.0,
                mass_fractions: vec![w0, 1.0 - w0],
                ..Default::default()
            }).unwrap();

            let w_sum: f64 = (0..fluid.n_constituents())
                .map(|i| fluid.constituent(i).unwrap().mass_fraction)
                .sum();
            let x_sum: f64 = (0..fluid.n_constituents())
                .map(|i| fluid.constituent(i).unwrap().mole_fraction)
                .sum();
            prop_assert!((w_sum - 1.0).abs() <= FRACTION_TOLERANCE);
            prop_assert!((x_sum - 1.0).abs() <= FRACTION_TOLERANCE);
        }

        #[test]
        fn mass_mole_mweight_consistency(
            w0 in 0.01_f64..0.99_f64,
            mass in 0.1_f64..100.0_f64,
        ) {
            let config = MixtureConfig::new(
                Arc::new(StandardProperties),
                &[FluidType::CO2, FluidType::H2],
            );
            let fluid = Mixture::new(&config, &MixtureInput {
                temperature: 300.0,
                pressure: 100.0,
                mass,
                mass_fractions: vec![w0, 1.0 - w0],
                ..Default::default()
            }).unwrap();
            prop_assert!(
                (fluid.mass() - fluid.mole() * fluid.mweight()).abs()
                    <= 1e-9 * fluid.mass().max(1.0)
            );
        }
    }
}

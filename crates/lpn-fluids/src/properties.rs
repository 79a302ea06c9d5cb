//! Thermophysical property registry.
//!
//! Properties are pure functions of (species, temperature, pressure).
//! The composite mixture evaluates its constituents at their partial
//! pressures and never caches registry output across state changes.

use crate::species::{FluidType, Phase};

/// Universal gas constant, J/(kmol·K) scaled so that ideal-gas density
/// works directly in kPa and kg/kmol: rho = P·MW / (R·T).
pub const GAS_CONSTANT: f64 = 8.314472;

/// Pure property lookups for a single species at a given state.
///
/// Temperatures are in K, pressures in kPa, densities in kg/m³,
/// viscosities in Pa·s, specific heats in J/(kg·K), conductivities
/// in W/(m·K).
pub trait PropertyModel: std::fmt::Debug + Send + Sync {
    fn density(&self, ty: FluidType, t: f64, p: f64) -> f64;
    fn viscosity(&self, ty: FluidType, t: f64, p: f64) -> f64;
    fn specific_heat(&self, ty: FluidType, t: f64, p: f64) -> f64;
    fn adiabatic_index(&self, ty: FluidType, t: f64, p: f64) -> f64;
    fn thermal_conductivity(&self, ty: FluidType, t: f64, p: f64) -> f64;

    /// Inverse of `density`: the pressure at which the species has the
    /// given density and temperature.
    fn pressure(&self, ty: FluidType, t: f64, rho: f64) -> f64;
}

/// Built-in property model: ideal-gas densities, constant liquid
/// densities, and constant per-species transport properties.
///
/// The closed forms make the temperature/enthalpy and pressure/density
/// inverse pairs exact, which the mixture consistency queries rely on.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardProperties;

struct SpeciesRecord {
    /// Liquid density (kg/m³); unused for gases.
    rho_liquid: f64,
    /// Dynamic viscosity (Pa·s).
    mu: f64,
    /// Specific heat at constant pressure (J/(kg·K)).
    cp: f64,
    /// Thermal conductivity (W/(m·K)).
    k: f64,
}

fn record(ty: FluidType) -> SpeciesRecord {
    match ty {
        FluidType::N2 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.78e-5,
            cp: 1040.0,
            k: 0.0259,
        },
        FluidType::O2 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 2.06e-5,
            cp: 918.0,
            k: 0.0266,
        },
        FluidType::CO2 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.49e-5,
            cp: 846.0,
            k: 0.0166,
        },
        FluidType::CO => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.77e-5,
            cp: 1040.0,
            k: 0.0250,
        },
        FluidType::H2O => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.00e-5,
            cp: 1864.0,
            k: 0.0196,
        },
        FluidType::CH4 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.11e-5,
            cp: 2220.0,
            k: 0.0332,
        },
        FluidType::H2 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 0.89e-5,
            cp: 14300.0,
            k: 0.1819,
        },
        FluidType::He => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.99e-5,
            cp: 5193.0,
            k: 0.1513,
        },
        FluidType::Ar => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 2.23e-5,
            cp: 520.0,
            k: 0.0177,
        },
        FluidType::NH3 => SpeciesRecord {
            rho_liquid: 0.0,
            mu: 1.01e-5,
            cp: 2190.0,
            k: 0.0244,
        },
        FluidType::WaterLiquid => SpeciesRecord {
            rho_liquid: 997.0,
            mu: 8.90e-4,
            cp: 4184.0,
            k: 0.598,
        },
        FluidType::OxygenLiquid => SpeciesRecord {
            rho_liquid: 1141.0,
            mu: 1.95e-4,
            cp: 1699.0,
            k: 0.150,
        },
        FluidType::MethaneLiquid => SpeciesRecord {
            rho_liquid: 422.6,
            mu: 1.17e-4,
            cp: 3480.0,
            k: 0.184,
        },
    }
}

impl PropertyModel for StandardProperties {
    fn density(&self, ty: FluidType, t: f64, p: f64) -> f64 {
        match ty.phase() {
            Phase::Gas => {
                if t < f64::EPSILON {
                    0.0
                } else {
                    p * ty.molar_mass() / (GAS_CONSTANT * t)
                }
            }
            _ => record(ty).rho_liquid,
        }
    }

    fn viscosity(&self, ty: FluidType, _t: f64, _p: f64) -> f64 {
        record(ty).mu
    }

    fn specific_heat(&self, ty: FluidType, _t: f64, _p: f64) -> f64 {
        record(ty).cp
    }

    fn adiabatic_index(&self, ty: FluidType, t: f64, p: f64) -> f64 {
        match ty.phase() {
            Phase::Gas => {
                let cp = self.specific_heat(ty, t, p);
                let r_specific = GAS_CONSTANT * 1000.0 / ty.molar_mass();
                cp / (cp - r_specific)
            }
            // Liquids are nearly incompressible; gamma ~ 1.
            _ => 1.0,
        }
    }

    fn thermal_conductivity(&self, ty: FluidType, _t: f64, _p: f64) -> f64 {
        record(ty).k
    }

    fn pressure(&self, ty: FluidType, t: f64, rho: f64) -> f64 {
        match ty.phase() {
            Phase::Gas => rho * GAS_CONSTANT * t / ty.molar_mass(),
            // Liquid density does not determine pressure; report zero.
            _ => 0.0,
        }
    }
}

//! Fluid species definitions.

use serde::{Deserialize, Serialize};

/// Phase of a fluid species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Gas,
    Liquid,
    Solid,
}

/// Constituent species available to composite mixtures.
///
/// Each tag carries its phase and molar mass; thermophysical properties
/// come from a [`crate::PropertyModel`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluidType {
    /// Nitrogen (N₂) gas
    N2,
    /// Oxygen (O₂) gas
    O2,
    /// Carbon dioxide (CO₂) gas
    CO2,
    /// Carbon monoxide (CO) gas
    CO,
    /// Water vapor (H₂O)
    H2O,
    /// Methane (CH₄) gas
    CH4,
    /// Hydrogen (H₂) gas
    H2,
    /// Helium (He) gas
    He,
    /// Argon (Ar) gas
    Ar,
    /// Ammonia (NH₃) gas
    NH3,
    /// Liquid water
    WaterLiquid,
    /// Liquid oxygen
    OxygenLiquid,
    /// Liquid methane
    MethaneLiquid,
}

impl FluidType {
    pub const ALL: [FluidType; 13] = [
        FluidType::N2,
        FluidType::O2,
        FluidType::CO2,
        FluidType::CO,
        FluidType::H2O,
        FluidType::CH4,
        FluidType::H2,
        FluidType::He,
        FluidType::Ar,
        FluidType::NH3,
        FluidType::WaterLiquid,
        FluidType::OxygenLiquid,
        FluidType::MethaneLiquid,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FluidType::N2 => "N2",
            FluidType::O2 => "O2",
            FluidType::CO2 => "CO2",
            FluidType::CO => "CO",
            FluidType::H2O => "H2O",
            FluidType::CH4 => "CH4",
            FluidType::H2 => "H2",
            FluidType::He => "He",
            FluidType::Ar => "Ar",
            FluidType::NH3 => "NH3",
            FluidType::WaterLiquid => "WATER_LIQUID",
            FluidType::OxygenLiquid => "O2_LIQUID",
            FluidType::MethaneLiquid => "CH4_LIQUID",
        }
    }

    /// Molar mass in kg/kmol.
    pub fn molar_mass(&self) -> f64 {
        match self {
            FluidType::N2 => 28.0134,
            FluidType::O2 => 31.9988,
            FluidType::CO2 => 44.0095,
            FluidType::CO => 28.0101,
            FluidType::H2O => 18.0153,
            FluidType::CH4 => 16.0425,
            FluidType::H2 => 2.01588,
            FluidType::He => 4.002602,
            FluidType::Ar => 39.948,
            FluidType::NH3 => 17.03056,
            FluidType::WaterLiquid => 18.0153,
            FluidType::OxygenLiquid => 31.9988,
            FluidType::MethaneLiquid => 16.0425,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            FluidType::WaterLiquid | FluidType::OxygenLiquid | FluidType::MethaneLiquid => {
                Phase::Liquid
            }
            _ => Phase::Gas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn molar_masses_are_positive() {
        for ty in FluidType::ALL {
            assert!(ty.molar_mass() > 0.0, "{:?}", ty);
        }
    }

    #[test]
    fn gas_and_liquid_variants_share_molar_mass() {
        assert_eq!(
            FluidType::H2O.molar_mass(),
            FluidType::WaterLiquid.molar_mass()
        );
        assert_eq!(
            FluidType::O2.molar_mass(),
            FluidType::OxygenLiquid.molar_mass()
        );
    }

    #[test]
    fn keys_are_unique() {
        for (i, a) in FluidType::ALL.iter().enumerate() {
            for b in &FluidType::ALL[i + 1..] {
                assert_ne!(a.key(), b.key());
            }
        }
    }
}

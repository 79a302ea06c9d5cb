//! Trace-compound sub-mixture.
//!
//! Trace compounds are low-concentration chemical species tracked
//! alongside a bulk composite fluid. They carry per-compound mass and
//! mole-fraction arrays and normally ride the bulk mixture during
//! transport; trace-only sources bypass the bulk entirely.

use crate::error::{FluidError, FluidResult};
use crate::species::FluidType;
use serde::{Deserialize, Serialize};

/// Chemical compounds trackable as trace species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compound {
    CO,
    CO2,
    H2O,
    NH3,
    CH4,
    H2,
    O2,
    /// Formaldehyde (CH₂O)
    CH2O,
    /// Acetaldehyde (C₂H₄O)
    C2H4O,
}

impl Compound {
    pub fn key(&self) -> &'static str {
        match self {
            Compound::CO => "CO",
            Compound::CO2 => "CO2",
            Compound::H2O => "H2O",
            Compound::NH3 => "NH3",
            Compound::CH4 => "CH4",
            Compound::H2 => "H2",
            Compound::O2 => "O2",
            Compound::CH2O => "CH2O",
            Compound::C2H4O => "C2H4O",
        }
    }

    /// Molar mass in kg/kmol.
    pub fn molar_mass(&self) -> f64 {
        match self {
            Compound::CO => 28.0101,
            Compound::CO2 => 44.0095,
            Compound::H2O => 18.0153,
            Compound::NH3 => 17.03056,
            Compound::CH4 => 16.0425,
            Compound::H2 => 2.01588,
            Compound::O2 => 31.9988,
            Compound::CH2O => 30.026,
            Compound::C2H4O => 44.053,
        }
    }

    /// Bulk fluid type this compound corresponds to, if any.
    pub fn bulk_fluid_type(&self) -> Option<FluidType> {
        match self {
            Compound::CO => Some(FluidType::CO),
            Compound::CO2 => Some(FluidType::CO2),
            Compound::H2O => Some(FluidType::H2O),
            Compound::NH3 => Some(FluidType::NH3),
            Compound::CH4 => Some(FluidType::CH4),
            Compound::H2 => Some(FluidType::H2),
            Compound::O2 => Some(FluidType::O2),
            Compound::CH2O | Compound::C2H4O => None,
        }
    }
}

/// Configuration of a trace-compound sub-mixture: the ordered compound
/// list with user-facing names. Duplicate compounds and duplicate names
/// are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCompoundsConfig {
    compounds: Vec<Compound>,
    names: Vec<String>,
}

impl TraceCompoundsConfig {
    pub fn new(entries: &[(Compound, &str)]) -> FluidResult<Self> {
        for (i, (compound, name)) in entries.iter().enumerate() {
            for (other, other_name) in &entries[..i] {
                if other == compound {
                    return Err(FluidError::Initialization {
                        what: format!("duplicate trace compound type {}", compound.key()),
                    });
                }
                if other_name == name {
                    return Err(FluidError::Initialization {
                        what: format!("duplicate trace compound name {name}"),
                    });
                }
            }
        }
        Ok(Self {
            compounds: entries.iter().map(|(c, _)| *c).collect(),
            names: entries.iter().map(|(_, n)| n.to_string()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    pub fn compound(&self, index: usize) -> FluidResult<Compound> {
        self.compounds
            .get(index)
            .copied()
            .ok_or_else(|| oob("compound", index, self.compounds.len()))
    }

    pub fn name(&self, index: usize) -> FluidResult<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| oob("compound name", index, self.names.len()))
    }

    pub fn find(&self, compound: Compound) -> Option<usize> {
        self.compounds.iter().position(|c| *c == compound)
    }
}

/// Per-compound state of a trace sub-mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCompounds {
    config: TraceCompoundsConfig,
    masses: Vec<f64>,
    mole_fractions: Vec<f64>,
}

impl TraceCompounds {
    /// Build the state from a config and optional initial mole fractions.
    /// Absent input defaults every mole fraction to zero.
    pub fn new(
        config: TraceCompoundsConfig,
        mole_fractions: Option<&[f64]>,
    ) -> FluidResult<Self> {
        let n = config.len();
        let fractions = match mole_fractions {
            Some(input) => {
                if input.len() != n {
                    return Err(FluidError::Initialization {
                        what: format!(
                            "trace compound input length {} does not match config length {n}",
                            input.len()
                        ),
                    });
                }
                input.to_vec()
            }
            None => vec![0.0; n],
        };
        Ok(Self {
            config,
            masses: vec![0.0; n],
            mole_fractions: fractions,
        })
    }

    pub fn config(&self) -> &TraceCompoundsConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }

    pub fn mass(&self, index: usize) -> FluidResult<f64> {
        self.masses
            .get(index)
            .copied()
            .ok_or_else(|| oob("trace compound mass", index, self.masses.len()))
    }

    pub fn mole_fraction(&self, index: usize) -> FluidResult<f64> {
        self.mole_fractions
            .get(index)
            .copied()
            .ok_or_else(|| oob("trace compound mole fraction", index, self.mole_fractions.len()))
    }

    pub fn find(&self, compound: Compound) -> FluidResult<usize> {
        self.config.find(compound).ok_or_else(|| FluidError::OutOfBounds {
            what: format!("trace compound {} not in config", compound.key()),
        })
    }

    pub fn set_mass(&mut self, index: usize, mass: f64) -> FluidResult<()> {
        let len = self.masses.len();
        *self
            .masses
            .get_mut(index)
            .ok_or_else(|| oob("trace compound mass", index, len))? = mass;
        Ok(())
    }

    pub fn add_mass(&mut self, index: usize, mass: f64) -> FluidResult<()> {
        let len = self.masses.len();
        *self
            .masses
            .get_mut(index)
            .ok_or_else(|| oob("trace compound mass", index, len))? += mass;
        Ok(())
    }

    /// Recompute mole fractions from current masses, relative to the
    /// parent fluid's moles. A vanishing parent mole count zeroes them.
    pub fn update_mole_fractions(&mut self, parent_mole: f64) {
        for (i, fraction) in self.mole_fractions.iter_mut().enumerate() {
            if parent_mole.abs() > f64::EPSILON {
                *fraction = self.masses[i] / self.config.compounds[i].molar_mass() / parent_mole;
            } else {
                *fraction = 0.0;
            }
        }
    }

    /// Scale all masses by a common ratio (bulk mass rescaling).
    pub fn scale_masses(&mut self, ratio: f64) {
        for mass in &mut self.masses {
            *mass *= ratio;
        }
    }

    /// Zero all masses and mole fractions.
    pub fn clear(&mut self) {
        self.masses.fill(0.0);
        self.mole_fractions.fill(0.0);
    }

    /// Deep-copy state from a compatible sub-mixture.
    pub fn set_state(&mut self, other: &TraceCompounds) -> FluidResult<()> {
        if self.config.compounds != other.config.compounds {
            return Err(FluidError::OutOfBounds {
                what: "trace compound configs do not match".into(),
            });
        }
        self.masses.copy_from_slice(&other.masses);
        self.mole_fractions.copy_from_slice(&other.mole_fractions);
        Ok(())
    }
}

fn oob(what: &str, index: usize, len: usize) -> FluidError {
    FluidError::OutOfBounds {
        what: format!("{what} index {index} out of range {len}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TraceCompoundsConfig {
        TraceCompoundsConfig::new(&[(Compound::CO, "CO"), (Compound::CH2O, "HCHO")]).unwrap()
    }

    #[test]
    fn duplicate_type_rejected() {
        let result = TraceCompoundsConfig::new(&[(Compound::CO, "a"), (Compound::CO, "b")]);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let result = TraceCompoundsConfig::new(&[(Compound::CO, "x"), (Compound::H2O, "x")]);
        assert!(result.is_err());
    }

    #[test]
    fn absent_input_defaults_to_zero() {
        let tc = TraceCompounds::new(config(), None).unwrap();
        assert_eq!(tc.mole_fraction(0).unwrap(), 0.0);
        assert_eq!(tc.mole_fraction(1).unwrap(), 0.0);
    }

    #[test]
    fn input_length_mismatch_rejected() {
        let result = TraceCompounds::new(config(), Some(&[1.0e-6]));
        assert!(result.is_err());
    }

    #[test]
    fn mole_fractions_follow_masses() {
        let mut tc = TraceCompounds::new(config(), None).unwrap();
        tc.set_mass(0, 2.80101e-5).unwrap();
        tc.update_mole_fractions(1.0e-3);
        // 2.80101e-5 kg of CO (28.0101 kg/kmol) in 1e-3 kmol of bulk
        let x = tc.mole_fraction(0).unwrap();
        assert!((x - 1.0e-3).abs() < 1e-12, "x = {x}");
    }

    #[test]
    fn scaling_masses() {
        let mut tc = TraceCompounds::new(config(), None).unwrap();
        tc.set_mass(0, 4.0).unwrap();
        tc.set_mass(1, 8.0).unwrap();
        tc.scale_masses(0.5);
        assert_eq!(tc.mass(0).unwrap(), 2.0);
        assert_eq!(tc.mass(1).unwrap(), 4.0);
    }

    #[test]
    fn out_of_bounds_lookup() {
        let tc = TraceCompounds::new(config(), None).unwrap();
        assert!(tc.mass(5).is_err());
        assert!(tc.find(Compound::NH3).is_err());
    }

    #[test]
    fn bulk_correspondence() {
        use crate::species::FluidType;
        assert_eq!(Compound::CO.bulk_fluid_type(), Some(FluidType::CO));
        assert_eq!(Compound::O2.bulk_fluid_type(), Some(FluidType::O2));
        // Pure trace species have no bulk counterpart.
        assert_eq!(Compound::CH2O.bulk_fluid_type(), None);
    }
}

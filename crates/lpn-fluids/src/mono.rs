//! Per-constituent fluid state.

use serde::{Deserialize, Serialize};

/// State of one constituent inside a composite mixture.
///
/// The mixture owns the property registry; this struct carries only the
/// constituent's share of the composite state, refreshed by
/// [`crate::Mixture`] whenever the composite changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonoFluid {
    /// Temperature (K), equal to the composite temperature.
    pub temperature: f64,
    /// Partial pressure (kPa).
    pub pressure: f64,
    /// Mass flow rate share (kg/s).
    pub flow_rate: f64,
    /// Mass share (kg).
    pub mass: f64,
    /// Mole share (kg·mol).
    pub mole: f64,
    /// Density at the constituent's partial pressure (kg/m³).
    pub density: f64,
}

impl MonoFluid {
    pub fn reset(&mut self) {
        *self = MonoFluid::default();
    }
}

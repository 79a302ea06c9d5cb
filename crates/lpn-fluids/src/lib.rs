//! lpn-fluids: composite-fluid constituent model.
//!
//! Provides:
//! - Fluid species tags with phase and molar mass (`FluidType`)
//! - A pure property registry of (type, temperature, pressure) lookups
//! - Per-constituent fluid state (`MonoFluid`)
//! - The composite mixture with derived thermophysical properties
//!   (`Mixture`), including the fraction-normalisation and mole/mass
//!   consistency invariants
//! - An optional trace-compound sub-mixture riding the bulk fluid
//!
//! # Example
//!
//! ```
//! use lpn_fluids::{FluidType, Mixture, MixtureConfig, MixtureInput, StandardProperties};
//! use std::sync::Arc;
//!
//! let config = MixtureConfig::new(
//!     Arc::new(StandardProperties),
//!     &[FluidType::N2, FluidType::O2],
//! );
//! let input = MixtureInput {
//!     temperature: 294.0,
//!     pressure: 101.325,
//!     flow_rate: 0.0,
//!     mass: 1.0,
//!     mass_fractions: vec![0.767, 0.233],
//!     trace_mole_fractions: None,
//! };
//! let air = Mixture::new(&config, &input).unwrap();
//! assert!(air.density() > 1.0);
//! ```

pub mod error;
pub mod mixture;
pub mod mono;
pub mod properties;
pub mod species;
pub mod trace;

// Re-exports for ergonomics
pub use error::{FluidError, FluidResult};
pub use mixture::{Mixture, MixtureConfig, MixtureInput, FRACTION_TOLERANCE};
pub use mono::MonoFluid;
pub use properties::{PropertyModel, StandardProperties};
pub use species::{FluidType, Phase};
pub use trace::{Compound, TraceCompounds, TraceCompoundsConfig};

//! lpn-links: concrete link library.
//!
//! Generic potential-domain links (conductor, capacitor, flux source)
//! work with any node flavour; the fluid boundary links transport
//! composite-fluid mixtures and attach to fluid nodes only.

pub mod capacitor;
pub mod conductor;
pub mod fire_source;
pub mod source;
pub mod source_boundary;

// Re-exports
pub use capacitor::Capacitor;
pub use conductor::Conductor;
pub use fire_source::{FireSource, FireSourceConfig};
pub use source::FluxSource;
pub use source_boundary::{SourceBoundary, SourceBoundaryConfig};

/// Minimum bulk mass flow rate for fluid transport. Below this, mass and
/// molar flows risk dropping under machine epsilon inside the mixture
/// math, so the flow is not transported.
pub const TRANSPORT_LIMIT: f64 = 100.0 * f64::EPSILON;

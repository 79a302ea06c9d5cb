//! lpn-core: stable foundation for the lpn network simulation workspace.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)
//! - events (health-and-status event sink)
//! - timing (wall-clock timers for solver metrics)

pub mod error;
pub mod events;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use events::{EventLevel, EventSink, NullSink, TracingSink};
pub use numeric::*;
pub use timing::Timer;

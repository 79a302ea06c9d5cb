//! Health-and-status event sink.
//!
//! The solver and links report mode changes, warnings, and configuration
//! faults through a sink injected at construction, rather than logging
//! directly. The default sink forwards to `tracing`; tests use `NullSink`
//! or a recording sink of their own.

/// Severity of a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

/// Receiver for health-and-status events.
///
/// `source` is the reporting object's name (e.g. the solver or link name).
pub trait EventSink {
    fn post(&self, level: EventLevel, source: &str, message: &str);
}

/// Default sink: forwards events to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn post(&self, level: EventLevel, source: &str, message: &str) {
        match level {
            EventLevel::Info => tracing::info!(source, "{message}"),
            EventLevel::Warning => tracing::warn!(source, "{message}"),
            EventLevel::Error => tracing::error!(source, "{message}"),
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn post(&self, _level: EventLevel, _source: &str, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullSink;
        sink.post(EventLevel::Info, "test", "hello");
        sink.post(EventLevel::Error, "test", "goodbye");
    }
}

//! Event sinks for pipeline observability.
//!
//! A sink is chosen when the run context is built and travels with it; there
//! is no process-wide default sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

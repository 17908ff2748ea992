//! Observability for the router
//!
//! - Structured JSON logging with a process-wide severity threshold
//! - Typed lifecycle events
//! - Atomic counters
//!
//! ```ignore
//! use shardunion::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::UnionTargeted, &[("shards", "0,1")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, UnionMetrics};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

//! Observability for the verification layer
//!
//! - Structured logging (JSON lines)
//! - Exact, monotonic counters
//! - Typed lifecycle and verification events
//!
//! Observability is read-only: it never changes the outcome of an operation.
//!
//! # Usage
//!
//! ```ignore
//! use aeroverify::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event_with_fields(Event::BlockCorruption, &[("block_index", "3")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log an event with fields
///
/// Fatal events are logged at FATAL severity, everything else at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

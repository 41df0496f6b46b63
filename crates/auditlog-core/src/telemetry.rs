// ABOUTME: Telemetry seam injected into storage backends and transport adapters.
// ABOUTME: Opens units of work, records errors, and counts events without tying callers to an exporter.

use std::sync::Arc;

use metrics::Label;
use tracing::Span;

/// Instrumentation hooks used around storage calls and requests.
///
/// A unit of work is the returned [`Span`]: callers instrument their future
/// with it and the unit ends when the span is dropped.
pub trait Telemetry: Send + Sync {
    /// Start a unit of work for `operation`. `statement` describes the
    /// concrete request (key, filter) and may be empty.
    fn span(&self, operation: &'static str, statement: &str) -> Span;

    /// Record a failure observed while performing `operation`.
    fn record_error(&self, operation: &'static str, error: &dyn std::error::Error);

    /// Increment the counter `name`, labelled by `attributes`.
    fn increment(&self, name: &'static str, attributes: &[(&'static str, &str)]);
}

/// Type alias for the Arc-wrapped telemetry handle passed to constructors.
pub type SharedTelemetry = Arc<dyn Telemetry>;

/// Telemetry that does nothing. Useful in tests and when instrumentation is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn span(&self, _operation: &'static str, _statement: &str) -> Span {
        Span::none()
    }

    fn record_error(&self, _operation: &'static str, _error: &dyn std::error::Error) {}

    fn increment(&self, _name: &'static str, _attributes: &[(&'static str, &str)]) {}
}

/// Counter bumped once per handled request, on either transport.
pub const REQUESTS_COUNTER: &str = "requests";

/// Counter bumped when the in-memory backend evicts expired records.
pub const EVICTIONS_COUNTER: &str = "memorydb.evictions";

/// Register descriptions for the counters this workspace emits. Call once
/// after a recorder is installed.
pub fn describe_counters() {
    metrics::describe_counter!(REQUESTS_COUNTER, "Requests handled, by transport, method and status");
    metrics::describe_counter!(EVICTIONS_COUNTER, "Expired records evicted by the in-memory backend");
}

/// Telemetry backed by `tracing` and the `metrics` facade: units of work
/// become spans, errors become `error!` events, and counters go to whatever
/// recorder is installed.
#[derive(Debug, Clone, Copy)]
pub struct TracingTelemetry {
    system: &'static str,
}

impl TracingTelemetry {
    /// `system` identifies the component in span fields (e.g. "memorydb").
    pub fn new(system: &'static str) -> Self {
        Self { system }
    }
}

impl Telemetry for TracingTelemetry {
    fn span(&self, operation: &'static str, statement: &str) -> Span {
        tracing::info_span!(
            "db",
            db.system = self.system,
            db.operation = operation,
            db.statement = statement
        )
    }

    fn record_error(&self, operation: &'static str, error: &dyn std::error::Error) {
        tracing::error!(system = self.system, operation, "{}", error);
    }

    fn increment(&self, name: &'static str, attributes: &[(&'static str, &str)]) {
        let labels: Vec<Label> = attributes
            .iter()
            .map(|(key, value)| Label::new(*key, value.to_string()))
            .collect();
        metrics::counter!(name, labels).increment(1);
    }
}

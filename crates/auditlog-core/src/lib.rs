// ABOUTME: Core library for auditlog, containing the event record and its validation rules.
// ABOUTME: Also defines the problem-details error body and the telemetry seam shared by every crate.

pub mod event;
pub mod problem;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use event::{Event, ValidationError};
pub use problem::ProblemDetails;
pub use telemetry::{
    EVICTIONS_COUNTER, NoopTelemetry, REQUESTS_COUNTER, SharedTelemetry, Telemetry, TracingTelemetry,
    describe_counters,
};

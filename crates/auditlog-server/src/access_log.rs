// ABOUTME: One structured log line per handled request, shared by the HTTP and function transports.
// ABOUTME: Also bumps the request counter on the injected telemetry.

use std::time::Duration;

use auditlog_core::{REQUESTS_COUNTER, Telemetry};

/// Who asked for what, and how it went.
#[derive(Debug, Clone, Default)]
pub struct AccessRecord<'a> {
    pub transport: &'static str,
    pub method: &'a str,
    pub path: &'a str,
    pub remote_addr: &'a str,
    pub user_agent: &'a str,
    pub status: u16,
    pub elapsed: Duration,
}

pub fn record(telemetry: &dyn Telemetry, entry: &AccessRecord<'_>) {
    let duration_ms = entry.elapsed.as_millis() as u64;
    tracing::info!(
        transport = entry.transport,
        duration_ms,
        status = entry.status,
        method = entry.method,
        path = entry.path,
        remote_addr = entry.remote_addr,
        user_agent = entry.user_agent,
        "request duration {}ms status code {} method {} path {} remote address {} agent {}",
        duration_ms,
        entry.status,
        entry.method,
        entry.path,
        entry.remote_addr,
        entry.user_agent,
    );
    let status = entry.status.to_string();
    telemetry.increment(
        REQUESTS_COUNTER,
        &[
            ("transport", entry.transport),
            ("method", method_label(entry.method)),
            ("status", status.as_str()),
        ],
    );
}

/// Counter label for a request method. Methods outside the standard set
/// share one label so client input cannot mint new counter series.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

// ABOUTME: The six event operations shared by the HTTP and function transports.
// ABOUTME: Each takes already-extracted request parts and returns a Reply, so both transports agree byte for byte.

use std::collections::HashMap;

use auditlog_core::{Event, ProblemDetails};
use auditlog_store::{OpContext, StoreError};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};

use crate::api::reply::Reply;
use crate::app_state::AppState;

/// Fixed body returned by the health check.
pub const HEALTH_BODY: &str = "OK";

/// Largest request body either transport accepts.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Parsed list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub status_code: i64,
}

impl EventFilter {
    /// Read `from`, `to` and `statusCode` from query parameters. Missing or
    /// blank values take defaults: the hour before `now`, and status 0.
    pub fn from_params(
        params: &HashMap<String, String>,
        now: DateTime<Utc>,
        instance: &str,
    ) -> Result<Self, ProblemDetails> {
        let from = match param(params, "from") {
            Some(raw) => parse_date("from", raw, instance)?,
            None => now - Duration::hours(1),
        };
        let to = match param(params, "to") {
            Some(raw) => parse_date("to", raw, instance)?,
            None => now,
        };
        let status_code = match param(params, "statusCode") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| ProblemDetails::invalid_parameter("statusCode", e, instance))?,
            None => 0,
        };
        Ok(Self {
            from,
            to,
            status_code,
        })
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_date(name: &str, raw: &str, instance: &str) -> Result<DateTime<Utc>, ProblemDetails> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| ProblemDetails::invalid_parameter(name, e, instance))
}

/// Decode and validate a request body.
fn decode_event(body: &[u8], instance: &str) -> Result<Event, ProblemDetails> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ProblemDetails::payload_too_large(MAX_BODY_BYTES, instance));
    }
    let event: Event = serde_json::from_slice(body)
        .map_err(|e| ProblemDetails::invalid_json(e.to_string(), instance))?;
    event
        .validate()
        .map_err(|e| ProblemDetails::invalid_body(e.to_string(), instance))?;
    Ok(event)
}

fn storage_failure(state: &AppState, operation: &'static str, err: StoreError, instance: &str) -> Reply {
    tracing::error!(operation, instance, "storage call failed: {}", err);
    state.telemetry.record_error(operation, &err);
    Reply::problem(ProblemDetails::internal(err.to_string(), instance))
}

/// Health check. Never touches storage.
pub fn health() -> Reply {
    Reply::text(StatusCode::OK, HEALTH_BODY)
}

/// Response for an id-addressed operation reached without an id.
pub fn missing_id(instance: &str) -> Reply {
    Reply::problem(ProblemDetails::missing_id(instance))
}

pub async fn list(
    state: &AppState,
    ctx: &OpContext,
    params: &HashMap<String, String>,
    instance: &str,
) -> Reply {
    let filter = match EventFilter::from_params(params, Utc::now(), instance) {
        Ok(filter) => filter,
        Err(problem) => return Reply::problem(problem),
    };

    match state
        .repository
        .find_by_date_and_return_code(ctx, filter.from, filter.to, filter.status_code)
        .await
    {
        Ok(events) => Reply::json(StatusCode::OK, &events),
        Err(err) => storage_failure(state, "list", err, instance),
    }
}

pub async fn get(state: &AppState, ctx: &OpContext, id: &str, instance: &str) -> Reply {
    if id.is_empty() {
        return missing_id(instance);
    }
    match state.repository.get(ctx, id).await {
        Ok(Some(event)) => Reply::json(StatusCode::OK, &event),
        Ok(None) => Reply::problem(ProblemDetails::not_found(instance)),
        Err(err) => storage_failure(state, "get", err, instance),
    }
}

/// Store a new event under a freshly generated id. Any id in the body is ignored.
pub async fn create(state: &AppState, ctx: &OpContext, body: &[u8], instance: &str) -> Reply {
    let event = match decode_event(body, instance) {
        Ok(event) => event.with_id(Event::new_id()),
        Err(problem) => return Reply::problem(problem),
    };
    match state.repository.save(ctx, event).await {
        Ok(saved) => Reply::json(StatusCode::CREATED, &saved),
        Err(err) => storage_failure(state, "create", err, instance),
    }
}

/// Store the body under the path id, replacing any existing record.
pub async fn replace(
    state: &AppState,
    ctx: &OpContext,
    id: &str,
    body: &[u8],
    instance: &str,
) -> Reply {
    if id.is_empty() {
        return missing_id(instance);
    }
    let event = match decode_event(body, instance) {
        Ok(event) => event.with_id(id),
        Err(problem) => return Reply::problem(problem),
    };
    match state.repository.save(ctx, event).await {
        Ok(saved) => Reply::json(StatusCode::CREATED, &saved),
        Err(err) => storage_failure(state, "replace", err, instance),
    }
}

pub async fn delete(state: &AppState, ctx: &OpContext, id: &str, instance: &str) -> Reply {
    if id.is_empty() {
        return missing_id(instance);
    }
    match state.repository.delete(ctx, id).await {
        Ok(Some(_)) => Reply::no_content(),
        Ok(None) => Reply::problem(ProblemDetails::not_found(instance)),
        Err(err) => storage_failure(state, "delete", err, instance),
    }
}

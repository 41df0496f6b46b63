// ABOUTME: Route definitions and thin axum handlers for the auditlog HTTP API.
// ABOUTME: Handlers extract path, query, and body, then delegate to the shared event operations.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use auditlog_core::ProblemDetails;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::access_log::{self, AccessRecord};
use crate::api::events;
use crate::api::reply::Reply;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes, fallbacks, and middleware.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/events",
            get(list_events)
                .post(create_event)
                .put(missing_id)
                .delete(missing_id),
        )
        .route(
            "/events/",
            get(missing_id).put(missing_id).delete(missing_id),
        )
        .route(
            "/events/{id}",
            get(get_event).put(replace_event).delete(delete_event),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(events::MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), log_access))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - fixed "OK" body.
async fn health() -> Reply {
    events::health()
}

/// GET /events - filter by date range and status code.
async fn list_events(
    State(state): State<SharedState>,
    uri: Uri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Reply {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return Reply::problem(ProblemDetails::invalid_parameter(
                "query",
                rejection.body_text(),
                uri.path(),
            ));
        }
    };
    let ctx = state.request_context();
    events::list(&state, &ctx, &params, uri.path()).await
}

/// GET /events/{id}
async fn get_event(
    State(state): State<SharedState>,
    uri: Uri,
    id: Result<Path<String>, PathRejection>,
) -> Reply {
    let id = match id {
        Ok(Path(id)) => id,
        Err(rejection) => return invalid_id(rejection, uri.path()),
    };
    let ctx = state.request_context();
    events::get(&state, &ctx, &id, uri.path()).await
}

/// POST /events - store under a new id.
async fn create_event(
    State(state): State<SharedState>,
    uri: Uri,
    body: Result<Bytes, BytesRejection>,
) -> Reply {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return unreadable_body(rejection, uri.path()),
    };
    let ctx = state.request_context();
    events::create(&state, &ctx, &body, uri.path()).await
}

/// PUT /events/{id} - store under the path id.
async fn replace_event(
    State(state): State<SharedState>,
    uri: Uri,
    id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Reply {
    let id = match id {
        Ok(Path(id)) => id,
        Err(rejection) => return invalid_id(rejection, uri.path()),
    };
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return unreadable_body(rejection, uri.path()),
    };
    let ctx = state.request_context();
    events::replace(&state, &ctx, &id, &body, uri.path()).await
}

/// DELETE /events/{id}
async fn delete_event(
    State(state): State<SharedState>,
    uri: Uri,
    id: Result<Path<String>, PathRejection>,
) -> Reply {
    let id = match id {
        Ok(Path(id)) => id,
        Err(rejection) => return invalid_id(rejection, uri.path()),
    };
    let ctx = state.request_context();
    events::delete(&state, &ctx, &id, uri.path()).await
}

fn invalid_id(rejection: PathRejection, instance: &str) -> Reply {
    Reply::problem(ProblemDetails::invalid_id(rejection.body_text(), instance))
}

/// The length limit renders the same problem the function transport emits
/// for an oversized body.
fn unreadable_body(rejection: BytesRejection, instance: &str) -> Reply {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return Reply::problem(ProblemDetails::payload_too_large(events::MAX_BODY_BYTES, instance));
    }
    Reply::problem(ProblemDetails::unreadable_body(status, rejection.body_text(), instance))
}

/// Id-addressed methods on `/events/` with nothing after the slash.
async fn missing_id(uri: Uri) -> Reply {
    events::missing_id(uri.path())
}

async fn route_not_found(uri: Uri) -> Reply {
    Reply::problem(ProblemDetails::route_not_found(uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> Reply {
    Reply::problem(ProblemDetails::method_not_allowed(method.as_str(), uri.path()))
}

/// Access-log middleware. The remote address is only known when the server
/// was started with connect info.
async fn log_access(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    access_log::record(
        state.telemetry.as_ref(),
        &AccessRecord {
            transport: "http",
            method: method.as_str(),
            path: &path,
            remote_addr: &remote_addr,
            user_agent: &user_agent,
            status: response.status().as_u16(),
            elapsed: started.elapsed(),
        },
    );
    response
}

// ABOUTME: End-to-end smoke test running the same event lifecycle through both transports.
// ABOUTME: Asserts the HTTP router and the function handler return identical statuses and bodies.

use std::sync::Arc;
use std::time::Duration;

use auditlog_server::{AppState, FunctionHandler, FunctionRequest, create_router};
use auditlog_store::{MemoryRepository, OpContext};
use axum::Router;
use axum::body::Body;
use http::Request;
use tower::ServiceExt;

/// One logical request, expressed independently of the transport.
struct Call {
    method: &'static str,
    path: &'static str,
    id: Option<&'static str>,
    query: &'static [(&'static str, &'static str)],
    body: Option<String>,
}

impl Call {
    fn new(method: &'static str, path: &'static str) -> Self {
        Self {
            method,
            path,
            id: None,
            query: &[],
            body: None,
        }
    }

    fn id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    fn query(mut self, query: &'static [(&'static str, &'static str)]) -> Self {
        self.query = query;
        self
    }

    fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body.to_string());
        self
    }
}

/// Fresh state with TTL assignment off, so stored bodies do not depend on the clock.
fn fresh_state() -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(MemoryRepository::new(Duration::ZERO))))
}

async fn via_http(app: &Router, call: &Call) -> (u16, String) {
    let mut uri = call.path.to_string();
    if !call.query.is_empty() {
        let pairs: Vec<String> = call.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        uri = format!("{}?{}", uri, pairs.join("&"));
    }
    let body = match &call.body {
        Some(body) => Body::from(body.clone()),
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method(call.method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn via_function(handler: &FunctionHandler, call: &Call) -> (u16, String) {
    let mut request = FunctionRequest::new(call.method, call.path);
    if let Some(id) = call.id {
        request = request.with_id(id);
    }
    for (name, value) in call.query {
        request = request.with_query(name, value);
    }
    if let Some(body) = &call.body {
        request = request.with_body(body);
    }
    let resp = handler.handle(request, &OpContext::background()).await;
    (resp.status_code, resp.body)
}

fn script() -> Vec<Call> {
    let past = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp();
    vec![
        Call::new("GET", "/health"),
        Call::new("PUT", "/events/a").id("a").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200,
            "statusMessage": "OK",
            "metadata": {"source": "smoke"}
        })),
        Call::new("PUT", "/events/b").id("b").body(serde_json::json!({
            "date": "2024-05-01T11:00:00Z",
            "statusCode": 200,
            "statusMessage": "OK"
        })),
        Call::new("GET", "/events/a").id("a"),
        Call::new("GET", "/events")
            .query(&[("from", "2024-05-01T10:00:00Z"), ("to", "2024-05-01T10:30:00Z"), ("statusCode", "200")]),
        Call::new("GET", "/events").query(&[("statusCode", "abc")]),
        Call::new("POST", "/events").body(serde_json::json!({"statusCode": 200})),
        Call::new("POST", "/events").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": -1
        })),
        Call::new("PUT", "/events/").body(serde_json::json!({"anything": true})),
        Call::new("DELETE", "/events/unknown-id").id("unknown-id"),
        Call::new("PUT", "/events/old").id("old").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200,
            "expiration": past
        })),
        Call::new("GET", "/events/old").id("old"),
        Call::new("DELETE", "/events/a").id("a"),
        Call::new("GET", "/events/a").id("a"),
        Call::new("PATCH", "/events"),
        Call::new("GET", "/events/"),
        Call::new("POST", "/events/").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200
        })),
        Call::new("POST", "/events/a").id("a").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200
        })),
        Call::new("PUT", "/events"),
        Call::new("DELETE", "/events"),
        Call::new("GET", "/nope"),
        Call::new("PUT", "/events/huge").id("huge").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200,
            "statusMessage": "x".repeat(3 * 1024 * 1024)
        })),
    ]
}

#[tokio::test]
async fn both_transports_answer_identically() {
    let app = create_router(fresh_state());
    let handler = FunctionHandler::new(fresh_state());

    for call in script() {
        let http = via_http(&app, &call).await;
        let function = via_function(&handler, &call).await;
        assert_eq!(
            http, function,
            "{} {} diverged between transports",
            call.method, call.path
        );
    }
}

#[tokio::test]
async fn lifecycle_scenarios() {
    let app = create_router(fresh_state());

    // Create assigns an id.
    let now = chrono::Utc::now().to_rfc3339();
    let (status, body) = via_http(
        &app,
        &Call::new("POST", "/events").body(serde_json::json!({
            "date": now,
            "statusCode": 201,
            "statusMessage": "Created"
        })),
    )
    .await;
    assert_eq!(status, 201);
    let created: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(!created["id"].as_str().unwrap().is_empty());
    assert_eq!(created["statusCode"], 201);

    // Missing date is rejected.
    let (status, body) = via_http(
        &app,
        &Call::new("POST", "/events").body(serde_json::json!({"statusCode": 200})),
    )
    .await;
    assert_eq!(status, 400);
    let problem: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(problem["title"], "Invalid Body");

    // Boundary dates are included.
    via_http(
        &app,
        &Call::new("PUT", "/events/edge").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200
        })),
    )
    .await;
    let (status, body) = via_http(
        &app,
        &Call::new("GET", "/events")
            .query(&[("from", "2024-05-01T10:00:00Z"), ("to", "2024-05-01T11:00:00Z"), ("statusCode", "200")]),
    )
    .await;
    assert_eq!(status, 200);
    let found: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "edge");

    // Unknown ids are 404 problems.
    let (status, body) = via_http(&app, &Call::new("DELETE", "/events/unknown-id")).await;
    assert_eq!(status, 404);
    let problem: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(problem["title"], "Not Found");

    // Empty id is rejected whatever the body.
    let (status, _) = via_http(&app, &Call::new("PUT", "/events/")).await;
    assert_eq!(status, 400);

    // Oversized bodies are refused with a problem, not stored.
    let (status, body) = via_http(
        &app,
        &Call::new("PUT", "/events/huge").body(serde_json::json!({
            "date": "2024-05-01T10:00:00Z",
            "statusCode": 200,
            "statusMessage": "x".repeat(3 * 1024 * 1024)
        })),
    )
    .await;
    assert_eq!(status, 413);
    let problem: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(problem["title"], "Payload Too Large");
    let (status, _) = via_http(&app, &Call::new("GET", "/events/huge")).await;
    assert_eq!(status, 404);
}

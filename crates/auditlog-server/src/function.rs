// ABOUTME: Function-invocation transport: one API Gateway HTTP (payload v2) event in, one response out.
// ABOUTME: Routes on method plus the `id` path parameter and reuses the shared event operations.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use auditlog_core::ProblemDetails;
use auditlog_store::OpContext;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::access_log::{self, AccessRecord};
use crate::api::events;
use crate::api::reply::Reply;
use crate::app_state::SharedState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub source_ip: String,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub http: HttpDescription,
}

/// The subset of an API Gateway HTTP API event this transport reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRequest {
    #[serde(default)]
    pub raw_path: String,
    #[serde(default)]
    pub request_context: RequestContext,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl FunctionRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            raw_path: path.to_string(),
            request_context: RequestContext {
                http: HttpDescription {
                    method: method.to_string(),
                    path: path.to_string(),
                    ..Default::default()
                },
            },
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.path_parameters
            .get_or_insert_with(HashMap::new)
            .insert("id".to_string(), id.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn method(&self) -> String {
        self.request_context.http.method.to_ascii_uppercase()
    }

    /// Request path, taken from the request context and falling back to `rawPath`.
    pub fn path(&self) -> &str {
        if self.request_context.http.path.is_empty() {
            &self.raw_path
        } else {
            &self.request_context.http.path
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.path_parameters
            .as_ref()
            .and_then(|p| p.get("id"))
            .map(String::as_str)
    }

    /// Raw body bytes, undoing the gateway's base64 encoding when flagged.
    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let body = self.body.as_deref().unwrap_or_default();
        if self.is_base64_encoded {
            BASE64.decode(body)
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }
}

/// API Gateway HTTP API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl From<Reply> for FunctionResponse {
    fn from(reply: Reply) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(content_type) = reply.content_type() {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        Self {
            status_code: reply.status.as_u16(),
            headers,
            body: reply.into_body_string(),
            is_base64_encoded: false,
        }
    }
}

/// Handles one invocation at a time against the shared state.
#[derive(Clone)]
pub struct FunctionHandler {
    state: SharedState,
}

impl FunctionHandler {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Route and execute one request. `ctx` should carry the invocation deadline.
    pub async fn handle(&self, request: FunctionRequest, ctx: &OpContext) -> FunctionResponse {
        let started = Instant::now();
        let method = request.method();
        let path = request.path().to_string();

        let reply = self.dispatch(&request, &method, &path, ctx).await;

        let http = &request.request_context.http;
        access_log::record(
            self.state.telemetry.as_ref(),
            &AccessRecord {
                transport: "function",
                method: &method,
                path: &path,
                remote_addr: &http.source_ip,
                user_agent: &http.user_agent,
                status: reply.status.as_u16(),
                elapsed: started.elapsed(),
            },
        );
        FunctionResponse::from(reply)
    }

    async fn dispatch(
        &self,
        request: &FunctionRequest,
        method: &str,
        path: &str,
        ctx: &OpContext,
    ) -> Reply {
        let state = self.state.as_ref();
        let not_allowed = || Reply::problem(ProblemDetails::method_not_allowed(method, path));

        match (Target::of(path, request.id()), method) {
            (Target::Health, "GET") => events::health(),
            (Target::Collection, "GET") => {
                let params = request.query_string_parameters.clone().unwrap_or_default();
                events::list(state, ctx, &params, path).await
            }
            (Target::Collection, "POST") => match request.body_bytes() {
                Ok(body) => events::create(state, ctx, &body, path).await,
                Err(e) => Reply::problem(ProblemDetails::invalid_json(e.to_string(), path)),
            },
            (Target::Collection | Target::MissingId, "GET" | "PUT" | "DELETE") => {
                events::missing_id(path)
            }
            (Target::Item(id), "GET") => events::get(state, ctx, id, path).await,
            (Target::Item(id), "PUT") => match request.body_bytes() {
                Ok(body) => events::replace(state, ctx, id, &body, path).await,
                Err(e) => Reply::problem(ProblemDetails::invalid_json(e.to_string(), path)),
            },
            (Target::Item(id), "DELETE") => events::delete(state, ctx, id, path).await,
            (Target::Unknown, _) => Reply::problem(ProblemDetails::route_not_found(path)),
            _ => not_allowed(),
        }
    }
}

/// What a request path addresses, mirroring the HTTP route table. Paths are
/// matched by suffix so a gateway stage prefix does not matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target<'a> {
    Health,
    Collection,
    MissingId,
    Item(&'a str),
    Unknown,
}

impl<'a> Target<'a> {
    fn of(path: &'a str, id: Option<&'a str>) -> Self {
        if path.ends_with("/health") && !path.ends_with("/events/health") {
            return Self::Health;
        }
        if path.ends_with("/events") {
            return Self::Collection;
        }
        if path.ends_with("/events/") {
            return Self::MissingId;
        }
        match path.rsplit_once('/') {
            Some((parent, segment)) if parent.ends_with("/events") => {
                Self::Item(id.filter(|id| !id.is_empty()).unwrap_or(segment))
            }
            _ => match id {
                Some(id) if !id.is_empty() => Self::Item(id),
                _ => Self::Unknown,
            },
        }
    }
}

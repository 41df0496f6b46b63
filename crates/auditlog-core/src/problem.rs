// ABOUTME: Problem-details error body (RFC 9457 shape) rendered on every failing response.
// ABOUTME: Constructors cover the fixed error taxonomy so both transports emit identical bodies.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// `type` used when no more specific problem URI applies.
pub const ABOUT_BLANK: &str = "about:blank";

/// `type` used for request bodies that are not valid JSON.
pub const JSON_SYNTAX_TYPE: &str = "https://www.rfc-editor.org/rfc/rfc8259";

/// Structured error body shared by the HTTP and function transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: u16,
    pub title: String,
    pub detail: String,
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProblemDetails {
    pub fn new(
        status: StatusCode,
        title: impl Into<String>,
        detail: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            kind: ABOUT_BLANK.to_string(),
            status: status.as_u16(),
            title: title.into(),
            detail: detail.into(),
            instance: instance.into(),
            code: None,
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The status as an HTTP status code, falling back to 500 for values
    /// outside the valid range.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// An id route parameter was absent or empty.
    pub fn missing_id(instance: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", "Missing event ID in URL", instance)
            .with_code("missing_id")
    }

    /// The request body could not be decoded as an event.
    pub fn invalid_json(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid JSON", detail, instance)
            .with_type(JSON_SYNTAX_TYPE)
            .with_code("invalid_json")
    }

    /// The decoded event failed validation.
    pub fn invalid_body(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid Body", detail, instance).with_code("invalid_body")
    }

    /// A filter parameter was present but could not be parsed.
    pub fn invalid_parameter(
        name: &str,
        reason: impl std::fmt::Display,
        instance: impl Into<String>,
    ) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid Body",
            format!("parameter {{{}}} invalid, {}", name, reason),
            instance,
        )
        .with_code("invalid_parameter")
    }

    /// The id path segment could not be decoded.
    pub fn invalid_id(reason: impl std::fmt::Display, instance: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Bad Request",
            format!("invalid event ID in URL, {}", reason),
            instance,
        )
        .with_code("invalid_id")
    }

    /// The request body exceeds `limit` bytes.
    pub fn payload_too_large(limit: usize, instance: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload Too Large",
            format!("request body exceeds {} bytes", limit),
            instance,
        )
        .with_code("payload_too_large")
    }

    /// The request body could not be read off the wire.
    pub fn unreadable_body(
        status: StatusCode,
        detail: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        let title = status.canonical_reason().unwrap_or("Bad Request");
        Self::new(status, title, detail, instance).with_code("unreadable_body")
    }

    /// No live record exists for the requested id.
    pub fn not_found(instance: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", "Event not found", instance)
            .with_code("not_found")
    }

    /// No route matches the request path.
    pub fn route_not_found(instance: impl Into<String>) -> Self {
        let instance = instance.into();
        Self::new(
            StatusCode::NOT_FOUND,
            "Not Found",
            format!("no route for {}", instance),
            instance,
        )
        .with_code("route_not_found")
    }

    /// The storage backend failed. The backend's error text is passed through
    /// as `detail`.
    pub fn internal(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", detail, instance)
            .with_code("storage_error")
    }

    /// The transport received a method it does not route.
    pub fn method_not_allowed(method: &str, instance: impl Into<String>) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
            format!("method {} is not supported", method),
            instance,
        )
        .with_code("method_not_allowed")
    }
}

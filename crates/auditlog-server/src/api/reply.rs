// ABOUTME: Transport-neutral response produced by every event operation.
// ABOUTME: Bodies are serialized once here so both transports send exactly the same bytes.

use auditlog_core::ProblemDetails;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Last-resort body when a value cannot be encoded.
const ENCODE_FAILURE: &[u8] = br#"{"type":"about:blank","status":500,"title":"Internal Server Error","detail":"unable to encode response","instance":""}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Empty,
    Text(String),
    Json(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: ReplyBody,
}

impl Reply {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self {
                status,
                body: ReplyBody::Json(bytes),
            },
            Err(e) => {
                tracing::error!("failed to encode response body: {}", e);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: ReplyBody::Json(ENCODE_FAILURE.to_vec()),
                }
            }
        }
    }

    pub fn problem(problem: ProblemDetails) -> Self {
        Self::json(problem.status_code(), &problem)
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(text.into()),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: ReplyBody::Empty,
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self.body {
            ReplyBody::Empty => None,
            ReplyBody::Text(_) => Some(TEXT_PLAIN),
            ReplyBody::Json(_) => Some(APPLICATION_JSON),
        }
    }

    pub fn body_bytes(&self) -> &[u8] {
        match &self.body {
            ReplyBody::Empty => &[],
            ReplyBody::Text(text) => text.as_bytes(),
            ReplyBody::Json(bytes) => bytes,
        }
    }

    /// The body as a string. Serialized JSON is always valid UTF-8.
    pub fn into_body_string(self) -> String {
        match self.body {
            ReplyBody::Empty => String::new(),
            ReplyBody::Text(text) => text,
            ReplyBody::Json(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status;
        match (self.content_type(), self.body) {
            (Some(content_type), ReplyBody::Text(text)) => {
                (status, [(header::CONTENT_TYPE, content_type)], text).into_response()
            }
            (Some(content_type), ReplyBody::Json(bytes)) => {
                (status, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
            }
            _ => status.into_response(),
        }
    }
}

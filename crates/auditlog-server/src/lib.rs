// ABOUTME: Transports for auditlog: an axum HTTP server and a serverless function handler.
// ABOUTME: Both delegate to one shared operation layer so their responses are identical.

pub mod access_log;
pub mod api;
pub mod app_state;
pub mod config;
pub mod function;
pub mod routes;
pub mod server;

pub use api::reply::Reply;
pub use app_state::{AppState, SharedState};
pub use config::{AuditlogConfig, Backend, ConfigError};
pub use function::{FunctionHandler, FunctionRequest, FunctionResponse};
pub use routes::create_router;
pub use server::serve;

// ABOUTME: Shared state handed to both transports: the repository, telemetry, and request limits.
// ABOUTME: Built once at startup; each request derives its own cancellation context from it.

use std::sync::Arc;
use std::time::Duration;

use auditlog_core::{NoopTelemetry, SharedTelemetry};
use auditlog_store::{OpContext, SharedRepository};
use tokio_util::sync::CancellationToken;

/// State accessible by every handler.
pub struct AppState {
    pub repository: SharedRepository,
    pub telemetry: SharedTelemetry,
    /// Deadline applied to the storage work of one request.
    pub request_timeout: Duration,
    /// Cancelled when the server stops waiting for in-flight requests.
    pub force_close: CancellationToken,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create state around `repository` with no-op telemetry and a 30s request timeout.
    pub fn new(repository: SharedRepository) -> Self {
        Self {
            repository,
            telemetry: Arc::new(NoopTelemetry),
            request_timeout: Duration::from_secs(30),
            force_close: CancellationToken::new(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Context for one HTTP request: cancelled on force-close, bounded by the request timeout.
    pub fn request_context(&self) -> OpContext {
        OpContext::with_token(self.force_close.child_token()).with_timeout(self.request_timeout)
    }
}

// ABOUTME: Error type for storage contract operations.
// ABOUTME: Covers cancellation, deadlines, backend client failures, record conversion, and table readiness.

use std::time::Duration;

use thiserror::Error;

use crate::dynamo::{ClientError, CodecError};

/// Errors returned by [`EventRepository`](crate::EventRepository) operations.
/// Absence of a record is not an error; it is reported as `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unable to convert record: {0}")]
    Codec(#[from] CodecError),

    #[error("table {table} did not become active within {waited:?}")]
    NotReady { table: String, waited: Duration },
}

impl StoreError {
    /// True for errors caused by the caller's context rather than the backend.
    pub fn is_context_error(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::DeadlineExceeded)
    }
}

// ABOUTME: The storage contract every auditlog backend implements.
// ABOUTME: Adapters depend only on this trait; backends are chosen by explicit construction at startup.

use std::sync::Arc;

use async_trait::async_trait;
use auditlog_core::Event;
use chrono::{DateTime, Utc};

use crate::context::OpContext;
use crate::error::StoreError;

/// Operations shared by the in-memory and DynamoDB backends.
///
/// Backends do not validate events; callers validate before `save`.
/// Records past their expiration are treated as absent by every read.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Initialize the backend (tables, indexes, expiry). Idempotent.
    async fn create(&self, ctx: &OpContext) -> Result<(), StoreError>;

    /// Upsert by id, fully replacing any prior record. Assigns an id when
    /// empty and an expiration when unassigned and a TTL is configured.
    /// Returns the record as stored.
    async fn save(&self, ctx: &OpContext, event: Event) -> Result<Event, StoreError>;

    /// Remove a record, returning it if it existed and had not expired.
    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError>;

    /// Fetch a live record by id.
    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError>;

    /// All live records with `date` in `[from, to]` and exactly `status_code`.
    /// Order is unspecified.
    async fn find_by_date_and_return_code(
        &self,
        ctx: &OpContext,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status_code: i64,
    ) -> Result<Vec<Event>, StoreError>;
}

/// Type alias for the Arc-wrapped repository handed to the adapters.
pub type SharedRepository = Arc<dyn EventRepository>;

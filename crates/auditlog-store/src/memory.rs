// ABOUTME: In-process storage backend: a mutex-guarded map from event id to event.
// ABOUTME: Expired records are evicted lazily, on the read or scan that first observes them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditlog_core::{EVICTIONS_COUNTER, Event, NoopTelemetry, SharedTelemetry};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::Instrument;

use crate::clock::{SharedClock, SystemClock};
use crate::context::OpContext;
use crate::error::StoreError;
use crate::repository::EventRepository;

/// Map-backed repository. Every access, including the eviction performed by
/// reads and scans, happens under a single lock.
pub struct MemoryRepository {
    events: Mutex<HashMap<String, Event>>,
    ttl: Duration,
    clock: SharedClock,
    telemetry: SharedTelemetry,
}

impl MemoryRepository {
    /// Create an empty repository assigning `now + ttl` expirations.
    /// A zero TTL leaves expirations unassigned.
    pub fn new(ttl: Duration) -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            ttl,
            clock: Arc::new(SystemClock),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Number of physically stored records, expired ones included until
    /// something evicts them.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait for the map lock, giving up if `ctx` is cancelled or times out first.
    async fn lock(&self, ctx: &OpContext) -> Result<MutexGuard<'_, HashMap<String, Event>>, StoreError> {
        ctx.run(async { Ok(self.events.lock().await) }).await
    }
}

#[async_trait]
impl EventRepository for MemoryRepository {
    async fn create(&self, ctx: &OpContext) -> Result<(), StoreError> {
        ctx.check()
    }

    async fn save(&self, ctx: &OpContext, mut event: Event) -> Result<Event, StoreError> {
        let span = self.telemetry.span("save", "");
        async {
            ctx.check()?;
            event.prepare_for_save(self.clock.now(), self.ttl);
            let mut events = self.lock(ctx).await?;
            events.insert(event.id.clone(), event.clone());
            Ok(event)
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError> {
        let span = self.telemetry.span("delete", &format!("id = {}", id));
        async {
            ctx.check()?;
            let now = self.clock.now();
            let removed = self.lock(ctx).await?.remove(id);
            match removed {
                Some(event) if event.is_expired(now) => {
                    self.telemetry.increment(EVICTIONS_COUNTER, &[("operation", "delete")]);
                    Ok(None)
                }
                Some(event) => Ok(Some(event)),
                None => {
                    tracing::debug!(id, "record not found");
                    Ok(None)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError> {
        let span = self.telemetry.span("get", &format!("id = {}", id));
        async {
            ctx.check()?;
            let now = self.clock.now();
            let mut events = self.lock(ctx).await?;
            let expired = match events.get(id) {
                None => {
                    tracing::debug!(id, "record not found");
                    return Ok(None);
                }
                Some(event) if event.is_expired(now) => true,
                Some(event) => return Ok(Some(event.clone())),
            };
            if expired {
                events.remove(id);
                self.telemetry.increment(EVICTIONS_COUNTER, &[("operation", "get")]);
            }
            Ok(None)
        }
        .instrument(span)
        .await
    }

    async fn find_by_date_and_return_code(
        &self,
        ctx: &OpContext,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status_code: i64,
    ) -> Result<Vec<Event>, StoreError> {
        let statement = format!(
            "from = {} to = {} statusCode = {}",
            from.to_rfc3339_opts(SecondsFormat::Secs, true),
            to.to_rfc3339_opts(SecondsFormat::Secs, true),
            status_code
        );
        let span = self.telemetry.span("query", &statement);
        async {
            ctx.check()?;
            let now = self.clock.now();
            let mut events = self.lock(ctx).await?;

            let mut expired = Vec::new();
            let mut found = Vec::new();
            for (id, event) in events.iter() {
                if event.is_expired(now) {
                    expired.push(id.clone());
                    continue;
                }
                if event.matches(from, to, status_code) {
                    found.push(event.clone());
                }
            }

            for id in &expired {
                events.remove(id);
            }
            if !expired.is_empty() {
                tracing::debug!(count = expired.len(), "evicted expired records during scan");
                self.telemetry.increment(EVICTIONS_COUNTER, &[("operation", "query")]);
            }

            Ok(found)
        }
        .instrument(span)
        .await
    }
}

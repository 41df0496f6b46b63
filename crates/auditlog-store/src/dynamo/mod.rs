// ABOUTME: DynamoDB storage backend: table bootstrap, keyed reads and writes, and paginated index queries.
// ABOUTME: Native expiry deletes lazily, so reads also hide records whose expiration has passed.

mod aws;
mod client;
mod codec;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditlog_core::{Event, NoopTelemetry, SharedTelemetry};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::Instrument;

pub use aws::AwsTableClient;
pub use client::{
    ClientError, Item, QueryPage, QueryRequest, TableClient, TableCreation, TableSchema, TableState,
};
pub use codec::{CodecError, format_date, from_item, key_for, to_item};

use crate::clock::{SharedClock, SystemClock};
use crate::context::OpContext;
use crate::error::StoreError;
use crate::repository::EventRepository;

pub const ATTR_ID: &str = "id";
pub const ATTR_DATE: &str = "date";
pub const ATTR_STATUS_CODE: &str = "statusCode";
pub const ATTR_STATUS_MESSAGE: &str = "statusMessage";
pub const ATTR_EXPIRATION: &str = "expiration";
pub const ATTR_METADATA: &str = "metadata";

/// Secondary index answering "status code X between two dates".
pub const STATUS_DATE_INDEX: &str = "date-statusCode-index";

#[derive(Debug, Clone)]
pub struct DynamoConfig {
    pub table: String,
    /// Lifetime assigned to records saved without an expiration. Zero disables.
    pub ttl: Duration,
    /// Delay between readiness checks while the table is being created.
    pub poll_interval: Duration,
    /// Give up waiting for the table after this long.
    pub ready_timeout: Duration,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table: "events".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl DynamoConfig {
    pub fn schema(&self) -> TableSchema {
        TableSchema {
            table: self.table.clone(),
            partition_key: ATTR_ID,
            index_name: STATUS_DATE_INDEX,
            index_hash_key: ATTR_STATUS_CODE,
            index_range_key: ATTR_DATE,
            ttl_attribute: ATTR_EXPIRATION,
        }
    }
}

pub struct DynamoRepository {
    client: Arc<dyn TableClient>,
    config: DynamoConfig,
    clock: SharedClock,
    telemetry: SharedTelemetry,
}

impl DynamoRepository {
    pub fn new(client: Arc<dyn TableClient>, config: DynamoConfig) -> Self {
        Self {
            client,
            config,
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

    pub fn config(&self) -> &DynamoConfig {
        &self.config
    }

    /// Run one client call under `ctx`, recording failures.
    async fn call<T, F>(&self, ctx: &OpContext, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, ClientError>> + Send,
    {
        let result = ctx.run(async { fut.await.map_err(StoreError::from) }).await;
        if let Err(err) = &result {
            self.telemetry.record_error(operation, err);
        }
        result
    }

    fn decode(&self, operation: &'static str, item: &Item) -> Result<Event, StoreError> {
        from_item(item).map_err(|err| {
            self.telemetry.record_error(operation, &err);
            StoreError::from(err)
        })
    }

    async fn wait_until_active(&self, ctx: &OpContext) -> Result<(), StoreError> {
        let started = Instant::now();
        loop {
            let state = self
                .call(ctx, "describe-table", self.client.describe_table(&self.config.table))
                .await?;
            if state == TableState::Active {
                tracing::debug!(table = %self.config.table, "table active");
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.config.ready_timeout {
                return Err(StoreError::NotReady {
                    table: self.config.table.clone(),
                    waited,
                });
            }
            tracing::debug!(table = %self.config.table, ?state, "waiting for table");

            let pause = self.config.poll_interval;
            ctx.run(async move {
                tokio::time::sleep(pause).await;
                Ok(())
            })
            .await?;
        }
    }
}

#[async_trait]
impl EventRepository for DynamoRepository {
    async fn create(&self, ctx: &OpContext) -> Result<(), StoreError> {
        let span = self.telemetry.span("create", &self.config.table);
        async {
            let schema = self.config.schema();
            match self
                .call(ctx, "create-table", self.client.create_table(&schema))
                .await?
            {
                TableCreation::Created => tracing::info!(table = %schema.table, "created table"),
                TableCreation::AlreadyExists => {
                    tracing::info!(table = %schema.table, "table already exists")
                }
            }

            self.wait_until_active(ctx).await?;

            self.call(
                ctx,
                "update-ttl",
                self.client.enable_ttl(&schema.table, schema.ttl_attribute),
            )
            .await?;
            tracing::info!(table = %schema.table, attribute = schema.ttl_attribute, "expiry enabled");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn save(&self, ctx: &OpContext, mut event: Event) -> Result<Event, StoreError> {
        let span = self.telemetry.span("save", "");
        async {
            ctx.check()?;
            event.prepare_for_save(self.clock.now(), self.config.ttl);
            let item = to_item(&event);
            self.call(ctx, "put-item", self.client.put_item(&self.config.table, item))
                .await?;
            Ok(event)
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError> {
        let span = self.telemetry.span("delete", &format!("id = {}", id));
        async {
            let old = self
                .call(ctx, "delete-item", self.client.delete_item(&self.config.table, key_for(id)))
                .await?;
            let Some(item) = old else {
                return Ok(None);
            };
            let event = self.decode("delete-item", &item)?;
            if event.is_expired(self.clock.now()) {
                return Ok(None);
            }
            Ok(Some(event))
        }
        .instrument(span)
        .await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Option<Event>, StoreError> {
        let span = self.telemetry.span("get", &format!("id = {}", id));
        async {
            let found = self
                .call(ctx, "get-item", self.client.get_item(&self.config.table, key_for(id)))
                .await?;
            let Some(item) = found else {
                return Ok(None);
            };
            let event = self.decode("get-item", &item)?;
            if event.is_expired(self.clock.now()) {
                tracing::debug!(id, "record expired but not yet removed");
                return Ok(None);
            }
            Ok(Some(event))
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
        let from = format_date(&from);
        let to = format_date(&to);
        let statement = format!("statusCode = {} AND date BETWEEN {} AND {}", status_code, from, to);
        let span = self.telemetry.span("query", &statement);
        async {
            let now = self.clock.now();
            let mut found = Vec::new();
            let mut start_key = None;
            let mut pages = 0usize;

            loop {
                let request = QueryRequest {
                    table: self.config.table.clone(),
                    index: STATUS_DATE_INDEX,
                    status_code,
                    from: from.clone(),
                    to: to.clone(),
                    exclusive_start_key: start_key.take(),
                };
                let page = self.call(ctx, "query", self.client.query(request)).await?;
                pages += 1;

                for item in &page.items {
                    let event = self.decode("query", item)?;
                    if !event.is_expired(now) {
                        found.push(event);
                    }
                }

                match page.last_evaluated_key {
                    Some(key) => start_key = Some(key),
                    None => break,
                }
            }

            tracing::debug!(pages, count = found.len(), "query complete");
            Ok(found)
        }
        .instrument(span)
        .await
    }
}

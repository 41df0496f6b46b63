// ABOUTME: Persistence layer for auditlog: the storage contract and its two interchangeable backends.
// ABOUTME: Provides the cancellation context, clock seam, in-memory store, and DynamoDB-backed store.

pub mod clock;
pub mod context;
pub mod dynamo;
pub mod error;
pub mod memory;
pub mod repository;

pub use clock::{Clock, SharedClock, SystemClock};
pub use context::OpContext;
pub use dynamo::{AwsTableClient, DynamoConfig, DynamoRepository, TableClient};
pub use error::StoreError;
pub use memory::MemoryRepository;
pub use repository::{EventRepository, SharedRepository};

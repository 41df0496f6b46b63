// ABOUTME: The narrow slice of the DynamoDB API the repository needs, as a mockable async trait.
// ABOUTME: Requests and responses use raw attribute maps; record conversion lives in the codec.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use thiserror::Error;

/// A raw DynamoDB item.
pub type Item = HashMap<String, AttributeValue>;

/// A failed call to the managed service. `message` carries the full error
/// context rendered by the SDK.
#[derive(Debug, Clone, Error)]
#[error("{operation}: {message}")]
pub struct ClientError {
    pub operation: &'static str,
    pub message: String,
}

impl ClientError {
    pub fn new(operation: &'static str, message: impl fmt::Display) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// Table layout: string partition key, a secondary index over
/// (numeric hash, string range) projecting all attributes, and a
/// numeric expiry attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub partition_key: &'static str,
    pub index_name: &'static str,
    pub index_hash_key: &'static str,
    pub index_range_key: &'static str,
    pub ttl_attribute: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    /// The service does not (yet) report the table.
    Missing,
    Active,
    /// Any other status, e.g. CREATING.
    Pending(String),
}

/// One page of an index query over `status_code` and a date range.
/// Bounds are already formatted the way dates are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub index: &'static str,
    pub status_code: i64,
    pub from: String,
    pub to: String,
    pub exclusive_start_key: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

/// Operations against the managed table service.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Create the table. An existing table is reported, not treated as an error.
    async fn create_table(&self, schema: &TableSchema) -> Result<TableCreation, ClientError>;

    async fn describe_table(&self, table: &str) -> Result<TableState, ClientError>;

    /// Turn on native expiry for `attribute`. Succeeds if already enabled.
    async fn enable_ttl(&self, table: &str, attribute: &str) -> Result<(), ClientError>;

    /// Unconditional put.
    async fn put_item(&self, table: &str, item: Item) -> Result<(), ClientError>;

    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, ClientError>;

    /// Delete and return the previous attributes, if any.
    async fn delete_item(&self, table: &str, key: Item) -> Result<Option<Item>, ClientError>;

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, ClientError>;
}

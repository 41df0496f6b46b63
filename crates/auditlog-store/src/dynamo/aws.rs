// ABOUTME: TableClient implementation over the official AWS SDK DynamoDB client.
// ABOUTME: Maps SDK builders and service errors onto the repository's narrow client contract.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    KeyType, Projection, ProjectionType, ReturnValue, ScalarAttributeType, TableStatus,
    TimeToLiveSpecification,
};

use super::client::{
    ClientError, Item, QueryPage, QueryRequest, TableClient, TableCreation, TableSchema, TableState,
};

/// `TableClient` backed by a configured SDK client.
#[derive(Debug, Clone)]
pub struct AwsTableClient {
    client: Client,
}

impl AwsTableClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn key_condition(schema_hash: &str) -> String {
    format!(
        "{} = :statusCode AND #date BETWEEN :from AND :to",
        schema_hash
    )
}

#[async_trait]
impl TableClient for AwsTableClient {
    async fn create_table(&self, schema: &TableSchema) -> Result<TableCreation, ClientError> {
        const OP: &str = "CreateTable";
        let build_err = |e: aws_sdk_dynamodb::error::BuildError| ClientError::new(OP, e);

        let index = GlobalSecondaryIndex::builder()
            .index_name(schema.index_name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(schema.index_hash_key)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(build_err)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(schema.index_range_key)
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(build_err)?,
            )
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .map_err(build_err)?;

        let result = self
            .client
            .create_table()
            .table_name(&schema.table)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(schema.partition_key)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_err)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(schema.index_hash_key)
                    .attribute_type(ScalarAttributeType::N)
                    .build()
                    .map_err(build_err)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(schema.index_range_key)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_err)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(schema.partition_key)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(build_err)?,
            )
            .global_secondary_indexes(index)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => Ok(TableCreation::Created),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_in_use_exception()) =>
            {
                Ok(TableCreation::AlreadyExists)
            }
            Err(err) => Err(ClientError::new(OP, DisplayErrorContext(&err))),
        }
    }

    async fn describe_table(&self, table: &str) -> Result<TableState, ClientError> {
        let result = self.client.describe_table().table_name(table).send().await;
        match result {
            Ok(out) => Ok(match out.table.and_then(|t| t.table_status) {
                Some(TableStatus::Active) => TableState::Active,
                Some(status) => TableState::Pending(status.as_str().to_string()),
                None => TableState::Pending("UNKNOWN".to_string()),
            }),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(TableState::Missing)
            }
            Err(err) => Err(ClientError::new("DescribeTable", DisplayErrorContext(&err))),
        }
    }

    async fn enable_ttl(&self, table: &str, attribute: &str) -> Result<(), ClientError> {
        const OP: &str = "UpdateTimeToLive";
        let spec = TimeToLiveSpecification::builder()
            .attribute_name(attribute)
            .enabled(true)
            .build()
            .map_err(|e| ClientError::new(OP, e))?;

        let result = self
            .client
            .update_time_to_live()
            .table_name(table)
            .time_to_live_specification(spec)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // Re-running against a table whose TTL is already on is a ValidationException.
            Err(err)
                if err.code() == Some("ValidationException")
                    && err
                        .message()
                        .is_some_and(|m| m.contains("already enabled")) =>
            {
                Ok(())
            }
            Err(err) => Err(ClientError::new(OP, DisplayErrorContext(&err))),
        }
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), ClientError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| ClientError::new("PutItem", DisplayErrorContext(&err)))
    }

    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, ClientError> {
        let out = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|err| ClientError::new("GetItem", DisplayErrorContext(&err)))?;
        Ok(out.item.filter(|item| !item.is_empty()))
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<Option<Item>, ClientError> {
        let out = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|err| ClientError::new("DeleteItem", DisplayErrorContext(&err)))?;
        Ok(out.attributes.filter(|item| !item.is_empty()))
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, ClientError> {
        let out = self
            .client
            .query()
            .table_name(&request.table)
            .index_name(request.index)
            .key_condition_expression(key_condition(super::ATTR_STATUS_CODE))
            .expression_attribute_names("#date", super::ATTR_DATE)
            .expression_attribute_values(
                ":statusCode",
                AttributeValue::N(request.status_code.to_string()),
            )
            .expression_attribute_values(":from", AttributeValue::S(request.from))
            .expression_attribute_values(":to", AttributeValue::S(request.to))
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(|err| ClientError::new("Query", DisplayErrorContext(&err)))?;

        Ok(QueryPage {
            items: out.items.unwrap_or_default(),
            last_evaluated_key: out.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_condition_uses_placeholder_for_reserved_date() {
        assert_eq!(
            key_condition("statusCode"),
            "statusCode = :statusCode AND #date BETWEEN :from AND :to"
        );
    }
}

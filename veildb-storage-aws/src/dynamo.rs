//! DynamoDB implementation of the abstract item store.
//!
//! Thin translation layer: every [`ItemStore`] operation maps onto one
//! SDK call, values are converted with [`crate::convert`], and the two
//! error shapes the layer cares about (conditional-check failures and
//! missing tables) are classified into their core kinds. Everything else
//! is preserved as `Error::Storage` text.

use crate::convert::{item_from_dynamo, item_to_dynamo, to_dynamo};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, DeleteRequest, KeySchemaElement, KeyType,
    KeysAndAttributes, PutRequest, ScalarAttributeType, WriteRequest as DynamoWriteRequest,
};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use veildb_core::{
    BatchGetOutput, BatchWriteOutput, BillingMode, Error, Item, ItemStore, KeySchema, Page,
    PutCondition, QueryRequest, Result, ScalarType, ScanRequest, SortPredicate, TableSpec,
    WriteRequest,
};

/// DynamoDB backend configuration
#[derive(Debug, Clone, Default)]
pub struct DynamoStoreConfig {
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// DynamoDB-backed [`ItemStore`].
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore").finish()
    }
}

// ─── Constructors ───────────────────────────────────────────────────────────

impl DynamoStore {
    /// Create a new DynamoDB store from SDK config.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoStoreConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region_str) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region_str));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create from a pre-built client (for testing).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

// ─── DynamoDB error classification ──────────────────────────────────────────

fn is_conditional_check_failed(
    err: &aws_sdk_dynamodb::error::SdkError<aws_sdk_dynamodb::operation::put_item::PutItemError>,
) -> bool {
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::operation::put_item::PutItemError;
    match err {
        SdkError::ServiceError(se) => {
            matches!(se.err(), PutItemError::ConditionalCheckFailedException(_))
        }
        _ => false,
    }
}

fn is_table_not_found(
    err: &aws_sdk_dynamodb::error::SdkError<
        aws_sdk_dynamodb::operation::describe_table::DescribeTableError,
    >,
) -> bool {
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
    match err {
        SdkError::ServiceError(se) => {
            matches!(se.err(), DescribeTableError::ResourceNotFoundException(_))
        }
        _ => false,
    }
}

fn is_table_already_exists(
    err: &aws_sdk_dynamodb::error::SdkError<
        aws_sdk_dynamodb::operation::create_table::CreateTableError,
    >,
) -> bool {
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::operation::create_table::CreateTableError;
    match err {
        SdkError::ServiceError(se) => {
            matches!(se.err(), CreateTableError::ResourceInUseException(_))
        }
        _ => false,
    }
}

fn build_err(e: impl std::fmt::Display) -> Error {
    Error::storage(format!("DynamoDB request build failed: {e}"))
}

// ─── Request assembly helpers ───────────────────────────────────────────────

fn scalar_attribute_type(scalar: ScalarType) -> ScalarAttributeType {
    match scalar {
        ScalarType::S => ScalarAttributeType::S,
        ScalarType::N => ScalarAttributeType::N,
        ScalarType::B => ScalarAttributeType::B,
    }
}

/// Key-condition expression and value bindings for a sort predicate.
fn sort_condition(
    predicate: &SortPredicate,
) -> (&'static str, Vec<(&'static str, AttributeValue)>) {
    match predicate {
        SortPredicate::Eq(value) => ("#sk = :skv", vec![(":skv", to_dynamo(value))]),
        SortPredicate::Lt(value) => ("#sk < :skv", vec![(":skv", to_dynamo(value))]),
        SortPredicate::Le(value) => ("#sk <= :skv", vec![(":skv", to_dynamo(value))]),
        SortPredicate::Gt(value) => ("#sk > :skv", vec![(":skv", to_dynamo(value))]),
        SortPredicate::Ge(value) => ("#sk >= :skv", vec![(":skv", to_dynamo(value))]),
        SortPredicate::Between(low, high) => (
            "#sk BETWEEN :sklo AND :skhi",
            vec![(":sklo", to_dynamo(low)), (":skhi", to_dynamo(high))],
        ),
        SortPredicate::BeginsWith(prefix) => (
            "begins_with(#sk, :skv)",
            vec![(":skv", AttributeValue::S(prefix.clone()))],
        ),
    }
}

fn page_from(
    items: &[HashMap<String, AttributeValue>],
    last_evaluated_key: Option<&HashMap<String, AttributeValue>>,
) -> Result<Page> {
    let converted = items
        .iter()
        .map(item_from_dynamo)
        .collect::<Result<Vec<Item>>>()?;
    let last = match last_evaluated_key {
        Some(key) if !key.is_empty() => Some(item_from_dynamo(key)?),
        _ => None,
    };
    Ok(Page {
        items: converted,
        last_evaluated_key: last,
    })
}

// ─── ItemStore ──────────────────────────────────────────────────────────────

#[async_trait]
impl ItemStore for DynamoStore {
    async fn describe_key_schema(&self, table: &str) -> Result<KeySchema> {
        let response = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| {
                if is_table_not_found(&e) {
                    Error::not_found(format!("table {table:?}"))
                } else {
                    Error::storage(format!("DynamoDB DescribeTable failed: {e}"))
                }
            })?;

        let mut partition_key = None;
        let mut sort_key = None;
        for element in response.table().map(|t| t.key_schema()).unwrap_or_default() {
            match element.key_type() {
                KeyType::Hash => partition_key = Some(element.attribute_name().to_string()),
                KeyType::Range => sort_key = Some(element.attribute_name().to_string()),
                _ => {}
            }
        }

        let partition_key = partition_key.ok_or_else(|| {
            Error::schema_invalid(format!("table {table:?} has no partition key"))
        })?;
        Ok(KeySchema {
            table: table.to_string(),
            partition_key,
            sort_key,
        })
    }

    async fn create_table_if_absent(&self, table: &str, spec: &TableSpec) -> Result<()> {
        if self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        let (partition_name, partition_type) = &spec.partition;
        let mut request = self
            .client
            .create_table()
            .table_name(table)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(partition_name)
                    .attribute_type(scalar_attribute_type(*partition_type))
                    .build()
                    .map_err(build_err)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(partition_name)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(build_err)?,
            );

        if let Some((sort_name, sort_type)) = &spec.sort {
            request = request
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(sort_name)
                        .attribute_type(scalar_attribute_type(*sort_type))
                        .build()
                        .map_err(build_err)?,
                )
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(sort_name)
                        .key_type(KeyType::Range)
                        .build()
                        .map_err(build_err)?,
                );
        }

        request = match spec.billing {
            BillingMode::PayPerRequest => {
                request.billing_mode(aws_sdk_dynamodb::types::BillingMode::PayPerRequest)
            }
            BillingMode::Provisioned {
                read_units,
                write_units,
            } => request
                .billing_mode(aws_sdk_dynamodb::types::BillingMode::Provisioned)
                .provisioned_throughput(
                    aws_sdk_dynamodb::types::ProvisionedThroughput::builder()
                        .read_capacity_units(read_units)
                        .write_capacity_units(write_units)
                        .build()
                        .map_err(build_err)?,
                ),
        };

        match request.send().await {
            Ok(_) => {
                debug!(table, "created table");
                Ok(())
            }
            // Lost a creation race; the table exists, which is all we need.
            Err(e) if is_table_already_exists(&e) => Ok(()),
            Err(e) => Err(Error::storage(format!("DynamoDB CreateTable failed: {e}"))),
        }
    }

    async fn put_item(&self, table: &str, item: Item, condition: PutCondition) -> Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(item_to_dynamo(&item)));

        if let PutCondition::NotExistsOrBelow { attribute, value } = &condition {
            request = request
                .condition_expression("attribute_not_exists(#v) OR #v < :new")
                .expression_attribute_names("#v", attribute)
                .expression_attribute_values(":new", AttributeValue::N(value.to_string()));
        }

        request.send().await.map_err(|e| {
            if is_conditional_check_failed(&e) {
                Error::precondition_failed(format!("conditional put rejected on table {table:?}"))
            } else {
                Error::storage(format!("DynamoDB PutItem failed: {e}"))
            }
        })?;
        Ok(())
    }

    async fn get_item(
        &self,
        table: &str,
        key: &Item,
        consistent_read: bool,
    ) -> Result<Option<Item>> {
        let response = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(item_to_dynamo(key)))
            .consistent_read(consistent_read)
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB GetItem failed: {e}")))?;

        response.item().map(item_from_dynamo).transpose()
    }

    async fn query(&self, table: &str, request: QueryRequest) -> Result<Page> {
        let (partition_attr, partition_value) = &request.partition;
        let mut query = self
            .client
            .query()
            .table_name(table)
            .expression_attribute_names("#pk", partition_attr)
            .expression_attribute_values(":pv", to_dynamo(partition_value))
            .scan_index_forward(request.scan_forward)
            .consistent_read(request.consistent_read);

        let mut key_condition = "#pk = :pv".to_string();
        if let Some((sort_attr, predicate)) = &request.sort {
            let (expression, values) = sort_condition(predicate);
            key_condition = format!("{key_condition} AND {expression}");
            query = query.expression_attribute_names("#sk", sort_attr);
            for (placeholder, value) in values {
                query = query.expression_attribute_values(placeholder, value);
            }
        }
        query = query.key_condition_expression(key_condition);

        if let Some(limit) = request.limit {
            query = query.limit(limit as i32);
        }
        if let Some(start_key) = &request.exclusive_start_key {
            query = query.set_exclusive_start_key(Some(item_to_dynamo(start_key)));
        }

        let response = query
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB Query failed: {e}")))?;

        page_from(response.items(), response.last_evaluated_key())
    }

    async fn scan(&self, table: &str, request: ScanRequest) -> Result<Page> {
        let mut scan = self
            .client
            .scan()
            .table_name(table)
            .consistent_read(request.consistent_read);

        if let Some(limit) = request.limit {
            scan = scan.limit(limit as i32);
        }
        if let Some(start_key) = &request.exclusive_start_key {
            scan = scan.set_exclusive_start_key(Some(item_to_dynamo(start_key)));
        }

        let response = scan
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB Scan failed: {e}")))?;

        page_from(response.items(), response.last_evaluated_key())
    }

    async fn batch_get(&self, requests: &HashMap<String, Vec<Item>>) -> Result<BatchGetOutput> {
        let mut request_items = HashMap::new();
        for (table, keys) in requests {
            let keys: Vec<_> = keys.iter().map(item_to_dynamo).collect();
            request_items.insert(
                table.clone(),
                KeysAndAttributes::builder()
                    .set_keys(Some(keys))
                    .build()
                    .map_err(build_err)?,
            );
        }

        let response = self
            .client
            .batch_get_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB BatchGetItem failed: {e}")))?;

        let mut output = BatchGetOutput::default();
        if let Some(responses) = response.responses() {
            for (table, items) in responses {
                let converted = items
                    .iter()
                    .map(item_from_dynamo)
                    .collect::<Result<Vec<Item>>>()?;
                output.responses.insert(table.clone(), converted);
            }
        }
        if let Some(unprocessed) = response.unprocessed_keys() {
            for (table, keys_and_attrs) in unprocessed {
                let keys = keys_and_attrs
                    .keys()
                    .iter()
                    .map(item_from_dynamo)
                    .collect::<Result<Vec<Item>>>()?;
                if !keys.is_empty() {
                    output.unprocessed.insert(table.clone(), keys);
                }
            }
        }
        Ok(output)
    }

    async fn batch_write(
        &self,
        requests: HashMap<String, Vec<WriteRequest>>,
    ) -> Result<BatchWriteOutput> {
        let mut request_items = HashMap::new();
        for (table, writes) in requests {
            let mut converted = Vec::with_capacity(writes.len());
            for write in writes {
                let dynamo_write = match write {
                    WriteRequest::Put(item) => DynamoWriteRequest::builder()
                        .put_request(
                            PutRequest::builder()
                                .set_item(Some(item_to_dynamo(&item)))
                                .build()
                                .map_err(build_err)?,
                        )
                        .build(),
                    WriteRequest::Delete(key) => DynamoWriteRequest::builder()
                        .delete_request(
                            DeleteRequest::builder()
                                .set_key(Some(item_to_dynamo(&key)))
                                .build()
                                .map_err(build_err)?,
                        )
                        .build(),
                };
                converted.push(dynamo_write);
            }
            request_items.insert(table, converted);
        }

        let response = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB BatchWriteItem failed: {e}")))?;

        let mut output = BatchWriteOutput::default();
        if let Some(unprocessed) = response.unprocessed_items() {
            for (table, writes) in unprocessed {
                let mut converted = Vec::with_capacity(writes.len());
                for write in writes {
                    if let Some(put) = write.put_request() {
                        converted.push(WriteRequest::Put(item_from_dynamo(put.item())?));
                    } else if let Some(delete) = write.delete_request() {
                        converted.push(WriteRequest::Delete(item_from_dynamo(delete.key())?));
                    }
                }
                if !converted.is_empty() {
                    output.unprocessed.insert(table.clone(), converted);
                }
            }
        }
        Ok(output)
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(item_to_dynamo(key)))
            .send()
            .await
            .map_err(|e| Error::storage(format!("DynamoDB DeleteItem failed: {e}")))?;
        Ok(())
    }
}

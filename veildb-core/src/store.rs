//! Abstract item-store interface.
//!
//! The encryption layer treats the underlying wide-column database as an
//! abstract store with exactly the operations the layer calls. Backends
//! implement [`ItemStore`]; the crate ships [`MemoryStore`](crate::MemoryStore)
//! for tests and `veildb-storage-aws` provides the DynamoDB backend.
//!
//! Partial-batch semantics are preserved verbatim: batch responses carry
//! the backend's `unprocessed` maps unchanged and callers decide whether
//! to retry.

use crate::error::Result;
use crate::value::AttrValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// An item: attribute name to attribute value.
pub type Item = HashMap<String, AttrValue>;

/// Primary-key layout of a table.
///
/// Immutable for the lifetime of a client; fetched once and cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchema {
    /// Table name
    pub table: String,
    /// Partition-key attribute name
    pub partition_key: String,
    /// Sort-key attribute name, if the table has one
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// True if `attribute` is one of the table's key attributes.
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        attribute == self.partition_key || self.sort_key.as_deref() == Some(attribute)
    }
}

/// Scalar type of a key attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    /// String
    S,
    /// Number
    N,
    /// Binary
    B,
}

/// Billing mode for table creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BillingMode {
    /// On-demand capacity
    #[default]
    PayPerRequest,
    /// Provisioned read/write capacity units
    Provisioned {
        /// Read capacity units
        read_units: i64,
        /// Write capacity units
        write_units: i64,
    },
}

/// Key layout and billing for table creation.
#[derive(Clone, Debug)]
pub struct TableSpec {
    /// Partition-key attribute name and type
    pub partition: (String, ScalarType),
    /// Optional sort-key attribute name and type
    pub sort: Option<(String, ScalarType)>,
    /// Billing mode
    pub billing: BillingMode,
}

impl TableSpec {
    /// Spec with a lone partition key and on-demand billing.
    pub fn partition_only(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            partition: (name.into(), scalar),
            sort: None,
            billing: BillingMode::default(),
        }
    }

    /// Spec with a composite primary key and on-demand billing.
    pub fn composite(
        partition: impl Into<String>,
        partition_type: ScalarType,
        sort: impl Into<String>,
        sort_type: ScalarType,
    ) -> Self {
        Self {
            partition: (partition.into(), partition_type),
            sort: Some((sort.into(), sort_type)),
            billing: BillingMode::default(),
        }
    }

    /// Override the billing mode.
    pub fn with_billing(mut self, billing: BillingMode) -> Self {
        self.billing = billing;
        self
    }

    /// Key schema implied by this spec.
    pub fn key_schema(&self, table: impl Into<String>) -> KeySchema {
        KeySchema {
            table: table.into(),
            partition_key: self.partition.0.clone(),
            sort_key: self.sort.as_ref().map(|(name, _)| name.clone()),
        }
    }
}

/// Condition attached to a put.
///
/// The layer needs exactly one conditional-write shape: the version
/// check-and-set used when appending material records.
#[derive(Clone, Debug, Default)]
pub enum PutCondition {
    /// Unconditional put
    #[default]
    None,
    /// Succeed only if no item exists at the key, or the named numeric
    /// attribute of the existing item is below `value`.
    NotExistsOrBelow {
        /// Numeric attribute the condition inspects
        attribute: String,
        /// Exclusive upper bound the existing value must stay under
        value: i64,
    },
}

/// Sort-key predicate for queries.
#[derive(Clone, Debug)]
pub enum SortPredicate {
    /// Sort key equals the value
    Eq(AttrValue),
    /// Sort key strictly below the value
    Lt(AttrValue),
    /// Sort key at or below the value
    Le(AttrValue),
    /// Sort key strictly above the value
    Gt(AttrValue),
    /// Sort key at or above the value
    Ge(AttrValue),
    /// Sort key within the inclusive range
    Between(AttrValue, AttrValue),
    /// String sort key starts with the prefix
    BeginsWith(String),
}

/// Query request: partition equality plus an optional sort-key predicate.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    /// Partition-key attribute name and required value
    pub partition: (String, AttrValue),
    /// Optional predicate over the sort key
    pub sort: Option<(String, SortPredicate)>,
    /// Ascending sort order when true (the default)
    pub scan_forward: bool,
    /// Maximum number of items per page
    pub limit: Option<u32>,
    /// Continuation token from the previous page
    pub exclusive_start_key: Option<Item>,
    /// Strongly consistent read
    pub consistent_read: bool,
}

impl QueryRequest {
    /// Query for all items under one partition value.
    pub fn partition_eq(attribute: impl Into<String>, value: AttrValue) -> Self {
        Self {
            partition: (attribute.into(), value),
            sort: None,
            scan_forward: true,
            limit: None,
            exclusive_start_key: None,
            consistent_read: false,
        }
    }

    /// Add a sort-key predicate.
    pub fn with_sort(mut self, attribute: impl Into<String>, predicate: SortPredicate) -> Self {
        self.sort = Some((attribute.into(), predicate));
        self
    }

    /// Return items in descending sort-key order.
    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    /// Cap the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the given key.
    pub fn with_exclusive_start_key(mut self, key: Option<Item>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    /// Request a strongly consistent read.
    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Scan request.
#[derive(Clone, Debug, Default)]
pub struct ScanRequest {
    /// Maximum number of items per page
    pub limit: Option<u32>,
    /// Continuation token from the previous page
    pub exclusive_start_key: Option<Item>,
    /// Strongly consistent read
    pub consistent_read: bool,
}

impl ScanRequest {
    /// Cap the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the given key.
    pub fn with_exclusive_start_key(mut self, key: Option<Item>) -> Self {
        self.exclusive_start_key = key;
        self
    }
}

/// One page of query or scan results.
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Items in this page
    pub items: Vec<Item>,
    /// Continuation token; absent on the last page
    pub last_evaluated_key: Option<Item>,
}

impl Page {
    /// True when the server reported no continuation.
    pub fn is_last_page(&self) -> bool {
        self.last_evaluated_key.is_none()
    }
}

/// One sub-request of a batch write.
#[derive(Clone, Debug)]
pub enum WriteRequest {
    /// Put the item
    Put(Item),
    /// Delete the item at the key
    Delete(Item),
}

/// Batch-get response with the backend's unprocessed keys preserved.
#[derive(Clone, Debug, Default)]
pub struct BatchGetOutput {
    /// Found items per table
    pub responses: HashMap<String, Vec<Item>>,
    /// Keys the backend did not process; the caller retries
    pub unprocessed: HashMap<String, Vec<Item>>,
}

/// Batch-write response with the backend's unprocessed requests preserved.
#[derive(Clone, Debug, Default)]
pub struct BatchWriteOutput {
    /// Requests the backend did not process; the caller retries
    pub unprocessed: HashMap<String, Vec<WriteRequest>>,
}

/// Abstract wide-column item store.
///
/// Implementations must be cheap to share (`Arc`) and safe for
/// concurrent use. Every method is self-contained; cancelling the
/// returned future abandons the call.
#[async_trait]
pub trait ItemStore: Send + Sync + Debug {
    /// Fetch the primary-key layout of a table.
    ///
    /// Returns `Error::SchemaInvalid` if the table has no partition key
    /// and `Error::NotFound` if the table does not exist.
    async fn describe_key_schema(&self, table: &str) -> Result<KeySchema>;

    /// Create the table if it does not already exist.
    async fn create_table_if_absent(&self, table: &str, spec: &TableSpec) -> Result<()>;

    /// Put an item, optionally guarded by a condition.
    ///
    /// Returns `Error::PreconditionFailed` when the condition rejects.
    async fn put_item(&self, table: &str, item: Item, condition: PutCondition) -> Result<()>;

    /// Point lookup by full primary key.
    async fn get_item(&self, table: &str, key: &Item, consistent_read: bool)
        -> Result<Option<Item>>;

    /// Query one partition.
    async fn query(&self, table: &str, request: QueryRequest) -> Result<Page>;

    /// Scan the table.
    async fn scan(&self, table: &str, request: ScanRequest) -> Result<Page>;

    /// Batch point lookups across tables.
    async fn batch_get(&self, requests: &HashMap<String, Vec<Item>>) -> Result<BatchGetOutput>;

    /// Batch puts and deletes across tables.
    async fn batch_write(
        &self,
        requests: HashMap<String, Vec<WriteRequest>>,
    ) -> Result<BatchWriteOutput>;

    /// Delete the item at the key. Deleting an absent item is not an error.
    async fn delete_item(&self, table: &str, key: &Item) -> Result<()>;
}

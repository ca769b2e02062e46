//! In-memory item store for testing.
//!
//! Stores tables in a `HashMap` behind `Arc<RwLock>` for interior
//! mutability, making it thread-safe and suitable for multi-threaded
//! async runtimes. Key ordering matches the real service: numbers compare
//! numerically, strings and binaries bytewise.

use crate::error::{Error, Result};
use crate::store::{
    BatchGetOutput, BatchWriteOutput, Item, ItemStore, KeySchema, Page, PutCondition,
    QueryRequest, ScanRequest, SortPredicate, TableSpec, WriteRequest,
};
use crate::value::AttrValue;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

/// In-memory [`ItemStore`] for tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

struct MemoryTable {
    spec: TableSpec,
    rows: Vec<Item>,
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("table_count", &tables.len())
            .finish()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw dump of a table's rows, for storage inspection in tests.
    pub fn raw_items(&self, table: &str) -> Vec<Item> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Overwrite a raw row in place, for tamper tests.
    ///
    /// Replaces the row whose full key matches `key`.
    pub fn replace_raw_item(&self, table: &str, key: &Item, item: Item) -> Result<()> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(format!("table {table:?}")))?;
        let schema = table_data.spec.key_schema(table);
        let wanted = key_of(&schema, key)?;
        for row in &mut table_data.rows {
            if key_of(&schema, row)? == wanted {
                *row = item;
                return Ok(());
            }
        }
        Err(Error::not_found(format!("item in table {table:?}")))
    }
}

/// Composite key extracted from a row, comparable DynamoDB-style.
#[derive(Clone, Debug)]
struct RowKey {
    partition: AttrValue,
    sort: Option<AttrValue>,
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_sort(other) == Ordering::Equal
            && key_value_cmp(&self.partition, &other.partition) == Ordering::Equal
    }
}

impl RowKey {
    fn cmp_sort(&self, other: &Self) -> Ordering {
        match (&self.sort, &other.sort) {
            (Some(a), Some(b)) => key_value_cmp(a, b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
}

fn key_of(schema: &KeySchema, item: &Item) -> Result<RowKey> {
    let partition = item
        .get(&schema.partition_key)
        .cloned()
        .ok_or_else(|| {
            Error::invalid_value(format!(
                "item missing partition key attribute {:?}",
                schema.partition_key
            ))
        })?;
    let sort = match &schema.sort_key {
        Some(name) => Some(item.get(name).cloned().ok_or_else(|| {
            Error::invalid_value(format!("item missing sort key attribute {name:?}"))
        })?),
        None => None,
    };
    Ok(RowKey { partition, sort })
}

fn key_item(schema: &KeySchema, item: &Item) -> Item {
    let mut key = Item::new();
    if let Some(value) = item.get(&schema.partition_key) {
        key.insert(schema.partition_key.clone(), value.clone());
    }
    if let Some(name) = &schema.sort_key {
        if let Some(value) = item.get(name) {
            key.insert(name.clone(), value.clone());
        }
    }
    key
}

/// Compare two key values the way the storage service sorts them.
fn key_value_cmp(a: &AttrValue, b: &AttrValue) -> Ordering {
    match (a, b) {
        (AttrValue::N(x), AttrValue::N(y)) => {
            match (BigDecimal::from_str(x), BigDecimal::from_str(y)) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (AttrValue::S(x), AttrValue::S(y)) => x.as_bytes().cmp(y.as_bytes()),
        (AttrValue::B(x), AttrValue::B(y)) => x.cmp(y),
        // Mixed-type keys never occur in a well-formed table; fall back to
        // the type name so ordering stays total.
        _ => a.type_name().cmp(b.type_name()),
    }
}

fn matches_predicate(value: &AttrValue, predicate: &SortPredicate) -> bool {
    match predicate {
        SortPredicate::Eq(want) => key_value_cmp(value, want) == Ordering::Equal,
        SortPredicate::Lt(want) => key_value_cmp(value, want) == Ordering::Less,
        SortPredicate::Le(want) => key_value_cmp(value, want) != Ordering::Greater,
        SortPredicate::Gt(want) => key_value_cmp(value, want) == Ordering::Greater,
        SortPredicate::Ge(want) => key_value_cmp(value, want) != Ordering::Less,
        SortPredicate::Between(low, high) => {
            key_value_cmp(value, low) != Ordering::Less
                && key_value_cmp(value, high) != Ordering::Greater
        }
        SortPredicate::BeginsWith(prefix) => {
            matches!(value, AttrValue::S(s) if s.starts_with(prefix))
        }
    }
}

/// Apply exclusive-start-key and limit to ordered candidates.
fn paginate(
    schema: &KeySchema,
    mut candidates: Vec<Item>,
    exclusive_start_key: Option<&Item>,
    limit: Option<u32>,
) -> Result<Page> {
    if let Some(start) = exclusive_start_key {
        let start_key = key_of(schema, start)?;
        if let Some(pos) = candidates
            .iter()
            .position(|row| key_of(schema, row).map(|k| k == start_key).unwrap_or(false))
        {
            candidates.drain(..=pos);
        }
    }

    let page_len = match limit {
        Some(limit) => (limit as usize).min(candidates.len()),
        None => candidates.len(),
    };
    let remainder = candidates.split_off(page_len);
    let last_evaluated_key = if remainder.is_empty() {
        None
    } else {
        candidates.last().map(|row| key_item(schema, row))
    };

    Ok(Page {
        items: candidates,
        last_evaluated_key,
    })
}

impl MemoryStore {
    fn with_table<T>(&self, table: &str, f: impl FnOnce(&MemoryTable) -> Result<T>) -> Result<T> {
        let tables = self.tables.read();
        let table_data = tables
            .get(table)
            .ok_or_else(|| Error::not_found(format!("table {table:?}")))?;
        f(table_data)
    }

    fn put_row(&self, table: &str, item: Item, condition: &PutCondition) -> Result<()> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(format!("table {table:?}")))?;
        let schema = table_data.spec.key_schema(table);
        let new_key = key_of(&schema, &item)?;

        let existing = table_data
            .rows
            .iter()
            .position(|row| key_of(&schema, row).map(|k| k == new_key).unwrap_or(false));

        if let PutCondition::NotExistsOrBelow { attribute, value } = condition {
            if let Some(pos) = existing {
                let passes = match table_data.rows[pos].get(attribute) {
                    None => true,
                    Some(AttrValue::N(text)) => text
                        .parse::<i64>()
                        .map(|current| current < *value)
                        .unwrap_or(false),
                    Some(_) => false,
                };
                if !passes {
                    return Err(Error::precondition_failed(format!(
                        "attribute {attribute:?} not below {value}"
                    )));
                }
            }
        }

        match existing {
            Some(pos) => table_data.rows[pos] = item,
            None => table_data.rows.push(item),
        }
        Ok(())
    }

    fn delete_row(&self, table: &str, key: &Item) -> Result<()> {
        let mut tables = self.tables.write();
        let table_data = tables
            .get_mut(table)
            .ok_or_else(|| Error::not_found(format!("table {table:?}")))?;
        let schema = table_data.spec.key_schema(table);
        let wanted = key_of(&schema, key)?;
        table_data
            .rows
            .retain(|row| key_of(&schema, row).map(|k| k != wanted).unwrap_or(true));
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn describe_key_schema(&self, table: &str) -> Result<KeySchema> {
        self.with_table(table, |table_data| {
            let schema = table_data.spec.key_schema(table);
            if schema.partition_key.is_empty() {
                return Err(Error::schema_invalid(format!(
                    "table {table:?} has no partition key"
                )));
            }
            Ok(schema)
        })
    }

    async fn create_table_if_absent(&self, table: &str, spec: &TableSpec) -> Result<()> {
        let mut tables = self.tables.write();
        tables.entry(table.to_string()).or_insert_with(|| MemoryTable {
            spec: spec.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item, condition: PutCondition) -> Result<()> {
        self.put_row(table, item, &condition)
    }

    async fn get_item(
        &self,
        table: &str,
        key: &Item,
        _consistent_read: bool,
    ) -> Result<Option<Item>> {
        self.with_table(table, |table_data| {
            let schema = table_data.spec.key_schema(table);
            let wanted = key_of(&schema, key)?;
            Ok(table_data
                .rows
                .iter()
                .find(|row| key_of(&schema, row).map(|k| k == wanted).unwrap_or(false))
                .cloned())
        })
    }

    async fn query(&self, table: &str, request: QueryRequest) -> Result<Page> {
        self.with_table(table, |table_data| {
            let schema = table_data.spec.key_schema(table);
            let (partition_attr, partition_value) = &request.partition;
            if *partition_attr != schema.partition_key {
                return Err(Error::storage(format!(
                    "query attribute {partition_attr:?} is not the partition key of {table:?}"
                )));
            }

            let mut candidates: Vec<Item> = table_data
                .rows
                .iter()
                .filter(|row| {
                    row.get(partition_attr)
                        .map(|v| key_value_cmp(v, partition_value) == Ordering::Equal)
                        .unwrap_or(false)
                })
                .filter(|row| match &request.sort {
                    Some((attr, predicate)) => row
                        .get(attr)
                        .map(|v| matches_predicate(v, predicate))
                        .unwrap_or(false),
                    None => true,
                })
                .cloned()
                .collect();

            if let Some(sort_key) = schema.sort_key.clone() {
                candidates.sort_by(|a, b| {
                    match (a.get(&sort_key), b.get(&sort_key)) {
                        (Some(x), Some(y)) => key_value_cmp(x, y),
                        _ => Ordering::Equal,
                    }
                });
            }
            if !request.scan_forward {
                candidates.reverse();
            }

            paginate(
                &schema,
                candidates,
                request.exclusive_start_key.as_ref(),
                request.limit,
            )
        })
    }

    async fn scan(&self, table: &str, request: ScanRequest) -> Result<Page> {
        self.with_table(table, |table_data| {
            let schema = table_data.spec.key_schema(table);
            let mut candidates = table_data.rows.clone();
            // Stable order so continuation tokens behave like the real thing.
            candidates.sort_by(|a, b| match (key_of(&schema, a), key_of(&schema, b)) {
                (Ok(ka), Ok(kb)) => key_value_cmp(&ka.partition, &kb.partition)
                    .then_with(|| ka.cmp_sort(&kb)),
                _ => Ordering::Equal,
            });

            paginate(
                &schema,
                candidates,
                request.exclusive_start_key.as_ref(),
                request.limit,
            )
        })
    }

    async fn batch_get(&self, requests: &HashMap<String, Vec<Item>>) -> Result<BatchGetOutput> {
        let mut output = BatchGetOutput::default();
        for (table, keys) in requests {
            let mut found = Vec::new();
            for key in keys {
                if let Some(item) = self.get_item(table, key, true).await? {
                    found.push(item);
                }
            }
            output.responses.insert(table.clone(), found);
        }
        Ok(output)
    }

    async fn batch_write(
        &self,
        requests: HashMap<String, Vec<WriteRequest>>,
    ) -> Result<BatchWriteOutput> {
        for (table, writes) in requests {
            for write in writes {
                match write {
                    WriteRequest::Put(item) => {
                        self.put_row(&table, item, &PutCondition::None)?;
                    }
                    WriteRequest::Delete(key) => self.delete_row(&table, &key)?,
                }
            }
        }
        Ok(BatchWriteOutput::default())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.delete_row(table, key)
    }
}

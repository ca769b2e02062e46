//! Lazy, shared cache of table key schemas.
//!
//! Read-mostly: after warm-up every lookup is a shared-lock read. A miss
//! upgrades to the exclusive lock, re-checks (another task may have
//! filled the entry while we waited), then describes the table through
//! the store and inserts. Entries are never evicted; a table's key
//! layout is immutable for the client's lifetime.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use veildb_core::{Error, ItemStore, KeySchema};

/// Per-client schema cache.
#[derive(Debug)]
pub struct SchemaCache {
    store: Arc<dyn ItemStore>,
    entries: RwLock<HashMap<String, Arc<KeySchema>>>,
}

impl SchemaCache {
    /// Cache describing tables through `store`.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Key schema for `table`, describing it on first use.
    ///
    /// # Errors
    ///
    /// Propagates describe failures; a table without a partition key is
    /// rejected with `Error::SchemaInvalid`.
    pub async fn get(&self, table: &str) -> Result<Arc<KeySchema>> {
        if let Some(schema) = self.entries.read().await.get(table) {
            return Ok(Arc::clone(schema));
        }

        let mut entries = self.entries.write().await;
        if let Some(schema) = entries.get(table) {
            return Ok(Arc::clone(schema));
        }

        let schema = self.store.describe_key_schema(table).await?;
        if schema.partition_key.is_empty() {
            return Err(Error::schema_invalid(format!(
                "table {table:?} has no partition key"
            ))
            .into());
        }
        debug!(table, "cached key schema");

        let schema = Arc::new(schema);
        entries.insert(table.to_string(), Arc::clone(&schema));
        Ok(schema)
    }
}

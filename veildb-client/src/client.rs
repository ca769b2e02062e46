//! The encrypted client facade.
//!
//! Drop-in front of the underlying item store: writes pass through the
//! encryption pipeline, reads through the decryption pipeline, and
//! deleting an item also destroys its companion material versions.

use crate::config::ClientConfig;
use crate::encrypt::{decrypt_item, encrypt_item};
use crate::error::Result;
use crate::paginate::EncryptedPaginator;
use crate::schema::SchemaCache;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use veildb_core::{
    material_name, BatchGetOutput, BatchWriteOutput, Error, Item, ItemStore, Page, PutCondition,
    QueryRequest, ScanRequest, WriteRequest,
};
use veildb_materials::MaterialsProvider;

/// Encrypting/decrypting wrapper around an item store.
///
/// Every operation is a self-contained future: dropping it cancels the
/// call, and when a per-operation timeout is configured, an elapsed
/// deadline surfaces as the `Cancelled` error kind. Partially written
/// material versions stay durable either way.
#[derive(Debug)]
pub struct EncryptedClient {
    store: Arc<dyn ItemStore>,
    provider: Arc<dyn MaterialsProvider>,
    config: ClientConfig,
    schemas: SchemaCache,
}

impl EncryptedClient {
    /// Create a client over `store`, managing materials through
    /// `provider`.
    pub fn new(
        store: Arc<dyn ItemStore>,
        provider: Arc<dyn MaterialsProvider>,
        config: ClientConfig,
    ) -> Self {
        let schemas = SchemaCache::new(Arc::clone(&store));
        Self {
            store,
            provider,
            config,
            schemas,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// Material name for an item or bare primary key of `table`.
    pub async fn material_name(&self, table: &str, key: &Item) -> Result<String> {
        let schema = self.schemas.get(table).await?;
        Ok(material_name(&schema, key)?)
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.config.operation_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::cancelled(format!("{operation} deadline elapsed")).into()),
            },
            None => fut.await,
        }
    }

    /// Encrypt `item` and put it.
    ///
    /// Each put appends a new material version for the item; reads use
    /// the latest.
    pub async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.with_deadline("PutItem", async {
            let schema = self.schemas.get(table).await?;
            let encrypted =
                encrypt_item(self.provider.as_ref(), self.config.actions(), &schema, &item).await?;
            self.store
                .put_item(table, encrypted, PutCondition::None)
                .await?;
            Ok(())
        })
        .await
    }

    /// Get and decrypt the item at `key`. Returns `None` when absent.
    pub async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        self.with_deadline("GetItem", async {
            let schema = self.schemas.get(table).await?;
            match self.store.get_item(table, key, false).await? {
                Some(encrypted) => Ok(Some(
                    decrypt_item(
                        self.provider.as_ref(),
                        self.config.actions(),
                        &schema,
                        &encrypted,
                    )
                    .await?,
                )),
                None => Ok(None),
            }
        })
        .await
    }

    /// Run a query and decrypt every returned item.
    pub async fn query(&self, table: &str, request: QueryRequest) -> Result<Page> {
        self.with_deadline("Query", async {
            let schema = self.schemas.get(table).await?;
            let page = self.store.query(table, request).await?;
            let mut items = Vec::with_capacity(page.items.len());
            for encrypted in &page.items {
                items.push(
                    decrypt_item(
                        self.provider.as_ref(),
                        self.config.actions(),
                        &schema,
                        encrypted,
                    )
                    .await?,
                );
            }
            Ok(Page {
                items,
                last_evaluated_key: page.last_evaluated_key,
            })
        })
        .await
    }

    /// Run a scan and decrypt every returned item.
    pub async fn scan(&self, table: &str, request: ScanRequest) -> Result<Page> {
        self.with_deadline("Scan", async {
            let schema = self.schemas.get(table).await?;
            let page = self.store.scan(table, request).await?;
            let mut items = Vec::with_capacity(page.items.len());
            for encrypted in &page.items {
                items.push(
                    decrypt_item(
                        self.provider.as_ref(),
                        self.config.actions(),
                        &schema,
                        encrypted,
                    )
                    .await?,
                );
            }
            Ok(Page {
                items,
                last_evaluated_key: page.last_evaluated_key,
            })
        })
        .await
    }

    /// Batch point lookups, decrypting each returned item under its
    /// table. Unprocessed keys are passed through untouched.
    pub async fn batch_get(
        &self,
        requests: &HashMap<String, Vec<Item>>,
    ) -> Result<BatchGetOutput> {
        self.with_deadline("BatchGetItem", async {
            let output = self.store.batch_get(requests).await?;
            let mut responses = HashMap::with_capacity(output.responses.len());
            for (table, items) in output.responses {
                let schema = self.schemas.get(&table).await?;
                let mut decrypted = Vec::with_capacity(items.len());
                for encrypted in &items {
                    decrypted.push(
                        decrypt_item(
                            self.provider.as_ref(),
                            self.config.actions(),
                            &schema,
                            encrypted,
                        )
                        .await?,
                    );
                }
                responses.insert(table, decrypted);
            }
            Ok(BatchGetOutput {
                responses,
                unprocessed: output.unprocessed,
            })
        })
        .await
    }

    /// Batch writes: put sub-requests are encrypted in place, delete
    /// sub-requests pass through.
    ///
    /// The store's unprocessed list is returned exactly as reported.
    /// Unprocessed put sub-requests already carry encrypted items (each
    /// with its material version stored), so resubmit them through the
    /// underlying store rather than through this method.
    pub async fn batch_write(
        &self,
        requests: HashMap<String, Vec<WriteRequest>>,
    ) -> Result<BatchWriteOutput> {
        self.with_deadline("BatchWriteItem", async {
            let mut encrypted_requests = HashMap::with_capacity(requests.len());
            for (table, writes) in requests {
                let schema = self.schemas.get(&table).await?;
                let mut encrypted_writes = Vec::with_capacity(writes.len());
                for write in writes {
                    match write {
                        WriteRequest::Put(item) => {
                            let encrypted = encrypt_item(
                                self.provider.as_ref(),
                                self.config.actions(),
                                &schema,
                                &item,
                            )
                            .await?;
                            encrypted_writes.push(WriteRequest::Put(encrypted));
                        }
                        delete @ WriteRequest::Delete(_) => encrypted_writes.push(delete),
                    }
                }
                encrypted_requests.insert(table, encrypted_writes);
            }
            Ok(self.store.batch_write(encrypted_requests).await?)
        })
        .await
    }

    /// Delete the item at `key`, then destroy every material version
    /// stored under its material name.
    ///
    /// Material destruction is best-effort after the delete: if it
    /// fails the error is returned, but the item stays deleted.
    pub async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.with_deadline("DeleteItem", async {
            let schema = self.schemas.get(table).await?;
            self.store.delete_item(table, key).await?;

            let name = material_name(&schema, key)?;
            let removed = self.provider.remove_materials(&name).await?;
            debug!(table, material_name = %name, versions = removed, "deleted item and materials");
            Ok(())
        })
        .await
    }

    /// Paginator threading the store's continuation token through
    /// [`query`](Self::query) or [`scan`](Self::scan).
    pub fn paginator(&self) -> EncryptedPaginator<'_> {
        EncryptedPaginator::new(self)
    }
}

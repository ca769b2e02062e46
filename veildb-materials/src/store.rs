//! Versioned persistence of wrapped keysets and their descriptions.
//!
//! Each material name owns a contiguous sequence of versions starting at
//! 1. Appending computes `latest + 1` and guards the put with a version
//! check-and-set; losers of a concurrent append surface
//! [`MaterialError::VersionConflict`] and the store never retries on
//! their behalf. Reads are strongly consistent.

use crate::error::{MaterialError, Result};
use crate::materials::MaterialDescription;
use crate::schema::{
    ATTR_MATERIAL_DESCRIPTION, ATTR_MATERIAL_NAME, ATTR_VERSION, DESC_WRAPPED_KEYSET,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use veildb_core::{
    AttrValue, Error, Item, ItemStore, PutCondition, QueryRequest, ScalarType, TableSpec,
    WriteRequest,
};

/// Batch-write sub-request ceiling of the underlying service.
const BATCH_WRITE_CHUNK: usize = 25;

/// Material store over the abstract item store.
#[derive(Clone, Debug)]
pub struct MaterialStore {
    store: Arc<dyn ItemStore>,
    table_name: String,
}

impl MaterialStore {
    /// Create a store writing to `table_name`.
    pub fn new(store: Arc<dyn ItemStore>, table_name: impl Into<String>) -> Self {
        Self {
            store,
            table_name: table_name.into(),
        }
    }

    /// Name of the backing table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the backing table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        let spec = TableSpec::composite(
            ATTR_MATERIAL_NAME,
            ScalarType::S,
            ATTR_VERSION,
            ScalarType::N,
        );
        self.store
            .create_table_if_absent(&self.table_name, &spec)
            .await?;
        Ok(())
    }

    /// Append a new version of the material under `name`.
    ///
    /// Returns the version that was written. A concurrent append to the
    /// same name surfaces as [`MaterialError::VersionConflict`]; retry
    /// policy belongs to the caller.
    pub async fn store_new(&self, name: &str, description: &MaterialDescription) -> Result<i64> {
        let new_version = match self.latest_version(name).await? {
            Some(current) => current + 1,
            None => 1,
        };

        // Sorted serialization keeps the stored JSON stable across runs.
        let ordered: BTreeMap<&str, &str> = description
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let description_json = serde_json::to_string(&ordered)
            .map_err(|e| MaterialError::description(format!("serialize failed: {e}")))?;

        let mut item = Item::new();
        item.insert(ATTR_MATERIAL_NAME.to_string(), AttrValue::string(name));
        item.insert(
            ATTR_VERSION.to_string(),
            AttrValue::number_from_i64(new_version),
        );
        item.insert(
            ATTR_MATERIAL_DESCRIPTION.to_string(),
            AttrValue::string(description_json),
        );

        let condition = PutCondition::NotExistsOrBelow {
            attribute: ATTR_VERSION.to_string(),
            value: new_version,
        };
        match self.store.put_item(&self.table_name, item, condition).await {
            Ok(()) => {
                debug!(material_name = name, version = new_version, "stored material");
                Ok(new_version)
            }
            Err(Error::PreconditionFailed(_)) => Err(MaterialError::version_conflict(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the description and base64 wrapped keyset for a version.
    ///
    /// A `version` below 1 resolves to the latest stored version.
    pub async fn retrieve(
        &self,
        name: &str,
        version: i64,
    ) -> Result<(MaterialDescription, String)> {
        let version = if version < 1 {
            self.latest_version(name)
                .await?
                .ok_or_else(|| MaterialError::not_found(name))?
        } else {
            version
        };

        let mut key = Item::new();
        key.insert(ATTR_MATERIAL_NAME.to_string(), AttrValue::string(name));
        key.insert(ATTR_VERSION.to_string(), AttrValue::number_from_i64(version));

        let item = self
            .store
            .get_item(&self.table_name, &key, true)
            .await?
            .ok_or_else(|| MaterialError::not_found(name))?;

        let description_json = item
            .get(ATTR_MATERIAL_DESCRIPTION)
            .and_then(AttrValue::as_str)
            .ok_or_else(|| {
                MaterialError::description(format!(
                    "material {name} v{version} has no string {ATTR_MATERIAL_DESCRIPTION}"
                ))
            })?;

        let description: MaterialDescription = serde_json::from_str(description_json)
            .map_err(|e| MaterialError::description(format!("parse failed: {e}")))?;

        let wrapped = description
            .get(DESC_WRAPPED_KEYSET)
            .cloned()
            .ok_or_else(|| MaterialError::missing_entry(name, DESC_WRAPPED_KEYSET))?;

        Ok((description, wrapped))
    }

    /// Highest stored version under `name`, if any.
    pub async fn latest_version(&self, name: &str) -> Result<Option<i64>> {
        let page = self
            .store
            .query(
                &self.table_name,
                QueryRequest::partition_eq(ATTR_MATERIAL_NAME, AttrValue::string(name))
                    .descending()
                    .with_limit(1)
                    .consistent(),
            )
            .await?;

        match page.items.first() {
            Some(item) => Ok(Some(version_of(item)?)),
            None => Ok(None),
        }
    }

    /// Every version stored under `name`, ascending.
    pub async fn all_versions(&self, name: &str) -> Result<Vec<i64>> {
        let mut versions = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .store
                .query(
                    &self.table_name,
                    QueryRequest::partition_eq(ATTR_MATERIAL_NAME, AttrValue::string(name))
                        .consistent()
                        .with_exclusive_start_key(start_key.take()),
                )
                .await?;

            for item in &page.items {
                versions.push(version_of(item)?);
            }

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(versions)
    }

    /// Delete every version stored under `name`.
    ///
    /// Returns the number of versions removed.
    pub async fn delete_all_versions(&self, name: &str) -> Result<usize> {
        let versions = self.all_versions(name).await?;

        for chunk in versions.chunks(BATCH_WRITE_CHUNK) {
            let deletes: Vec<WriteRequest> = chunk
                .iter()
                .map(|version| {
                    let mut key = Item::new();
                    key.insert(ATTR_MATERIAL_NAME.to_string(), AttrValue::string(name));
                    key.insert(
                        ATTR_VERSION.to_string(),
                        AttrValue::number_from_i64(*version),
                    );
                    WriteRequest::Delete(key)
                })
                .collect();

            let mut requests = HashMap::new();
            requests.insert(self.table_name.clone(), deletes);
            let output = self.store.batch_write(requests).await?;
            if !output.unprocessed.is_empty() {
                return Err(MaterialError::Store(Error::storage(format!(
                    "material {name}: store left version deletes unprocessed"
                ))));
            }
        }

        debug!(
            material_name = name,
            versions = versions.len(),
            "deleted material versions"
        );
        Ok(versions.len())
    }
}

fn version_of(item: &Item) -> Result<i64> {
    let text = item
        .get(ATTR_VERSION)
        .and_then(AttrValue::as_number)
        .ok_or_else(|| {
            MaterialError::description(format!("material record has no numeric {ATTR_VERSION}"))
        })?;
    text.parse::<i64>().map_err(|e| {
        MaterialError::description(format!("material record has unparseable version: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_TABLE_NAME;
    use veildb_core::MemoryStore;

    fn description(payload: &str) -> MaterialDescription {
        let mut description = MaterialDescription::new();
        description.insert(DESC_WRAPPED_KEYSET.to_string(), payload.to_string());
        description
    }

    async fn store() -> MaterialStore {
        let backing = Arc::new(MemoryStore::new());
        let store = MaterialStore::new(backing, DEFAULT_TABLE_NAME);
        store.ensure_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_versions_are_contiguous_from_one() {
        let store = store().await;

        assert_eq!(store.store_new("m", &description("a")).await.unwrap(), 1);
        assert_eq!(store.store_new("m", &description("b")).await.unwrap(), 2);
        assert_eq!(store.store_new("m", &description("c")).await.unwrap(), 3);
        assert_eq!(store.all_versions("m").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_retrieve_exact_and_latest() {
        let store = store().await;
        store.store_new("m", &description("first")).await.unwrap();
        store.store_new("m", &description("second")).await.unwrap();

        let (_, wrapped) = store.retrieve("m", 1).await.unwrap();
        assert_eq!(wrapped, "first");

        // Version 0 means latest.
        let (_, wrapped) = store.retrieve("m", 0).await.unwrap();
        assert_eq!(wrapped, "second");
    }

    #[tokio::test]
    async fn test_retrieve_missing_material() {
        let store = store().await;
        let err = store.retrieve("absent", 0).await.unwrap_err();
        assert!(matches!(err, MaterialError::MaterialNotFound { .. }));
    }

    #[tokio::test]
    async fn test_names_are_isolated() {
        let store = store().await;
        store.store_new("a", &description("x")).await.unwrap();
        store.store_new("b", &description("y")).await.unwrap();

        assert_eq!(store.all_versions("a").await.unwrap(), vec![1]);
        assert_eq!(store.all_versions("b").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_delete_all_versions() {
        let store = store().await;
        store.store_new("m", &description("a")).await.unwrap();
        store.store_new("m", &description("b")).await.unwrap();

        assert_eq!(store.delete_all_versions("m").await.unwrap(), 2);
        assert_eq!(store.all_versions("m").await.unwrap(), Vec::<i64>::new());
        assert!(store.latest_version("m").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_wrapped_keyset_entry() {
        let store = store().await;
        let mut bare = MaterialDescription::new();
        bare.insert("user".to_string(), "context".to_string());
        store.store_new("m", &bare).await.unwrap();

        let err = store.retrieve("m", 0).await.unwrap_err();
        assert!(matches!(err, MaterialError::MissingDescriptionEntry { .. }));
    }
}

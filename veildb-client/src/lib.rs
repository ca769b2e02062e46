//! Transparent attribute-level encryption in front of a wide-column
//! store.
//!
//! [`EncryptedClient`] is a drop-in replacement for the underlying
//! database client: selected attributes are encrypted on write and
//! decrypted on read, while primary-key attributes stay in the clear so
//! queries, scans, and point lookups keep working.
//!
//! ```ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use veildb_client::{Action, ClientConfig, EncryptedClient};
//! use veildb_core::{AttrValue, Item, MemoryStore};
//! use veildb_keys::InMemoryKeyProvider;
//! use veildb_materials::{MaterialStore, WrappedMaterialsProvider};
//!
//! let store = Arc::new(MemoryStore::new());
//! let materials = MaterialStore::new(store.clone(), "veildb-materials");
//! materials.ensure_table().await?;
//! let provider = WrappedMaterialsProvider::new(
//!     "aws-kms://arn:aws:kms:eu-west-2:000000000000:key/example",
//!     Arc::new(InMemoryKeyProvider::new()),
//!     HashMap::new(),
//!     materials,
//! );
//! let client = EncryptedClient::new(
//!     store,
//!     Arc::new(provider),
//!     ClientConfig::new()
//!         .with_default_action(Action::EncryptRandomized)
//!         .with_attribute_action("email", Action::EncryptDeterministic),
//! );
//!
//! let mut item = Item::new();
//! item.insert("id".to_string(), AttrValue::string("001"));
//! item.insert("email".to_string(), AttrValue::string("johndoe@example.com"));
//! client.put_item("users", item).await?;
//! ```
//!
//! Production deployments swap `MemoryStore` for
//! `veildb_storage_aws::DynamoStore` and `InMemoryKeyProvider` for
//! `veildb_keys::KmsKeyProvider`.

mod action;
mod client;
mod config;
mod encrypt;
mod error;
mod paginate;
mod schema;

pub use action::{Action, AttributeActions};
pub use client::EncryptedClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use paginate::EncryptedPaginator;
pub use schema::SchemaCache;

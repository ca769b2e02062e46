//! DynamoDB backend for the VeilDB item-store abstraction.
//!
//! [`DynamoStore`] implements `veildb_core::ItemStore` over
//! `aws-sdk-dynamodb`. Construct it from shared SDK config (with optional
//! region/endpoint/timeout overrides) or from a pre-built client:
//!
//! ```ignore
//! use veildb_storage_aws::{DynamoStore, DynamoStoreConfig};
//!
//! let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//! let store = DynamoStore::new(&sdk_config, DynamoStoreConfig::default());
//! ```

pub mod convert;
mod dynamo;

pub use dynamo::{DynamoStore, DynamoStoreConfig};

//! Core value model, canonical binary codec, and abstract store traits
//! for VeilDB.
//!
//! This crate holds everything the encryption layer needs that is neither
//! cryptographic nor backend-specific:
//!
//! - [`AttrValue`]: the tagged union over wide-column attribute types
//! - [`codec`]: self-describing canonical binary (de)serialization
//! - [`projection_string`]: the string projection used for material names
//! - [`material_name`]: the stable item-to-material identifier
//! - [`ItemStore`]: the abstract store interface backends implement
//! - [`MemoryStore`]: the in-memory store used throughout the tests
//!
//! The DynamoDB backend lives in `veildb-storage-aws`; the cryptographic
//! layers live in `veildb-keys` and `veildb-materials`.

pub mod codec;
pub mod error;
mod material_name;
pub mod memory;
mod projection;
pub mod store;
mod value;

pub use error::{Error, Result};
pub use material_name::{material_name, sha256_hex};
pub use memory::MemoryStore;
pub use projection::projection_string;
pub use store::{
    BatchGetOutput, BatchWriteOutput, BillingMode, Item, ItemStore, KeySchema, Page, PutCondition,
    QueryRequest, ScalarType, ScanRequest, SortPredicate, TableSpec, WriteRequest,
};
pub use value::{canonical_number, AttrValue};

//! Delegated keys and KEK providers for VeilDB.
//!
//! This crate provides the key-management half of the envelope-encryption
//! pipeline:
//!
//! - [`KeyProvider`]: resolves KEK URIs (e.g. `aws-kms://<arn>`) into
//!   AEAD primitives; [`KmsKeyProvider`] for AWS KMS,
//!   [`InMemoryKeyProvider`] for tests
//! - [`Keyset`]: an opaque bundle of raw key entries
//! - [`DelegatedKey`]: the uniform capability interface over randomized
//!   AEAD, deterministic AEAD, and signing keysets, including
//!   wrap/unwrap under a KEK
//!
//! Nothing in this crate touches the item store; material persistence
//! lives in `veildb-materials`.

mod delegated;
mod error;
mod kek;
mod keyset;

pub use delegated::{verify_signature, DelegatedKey};
pub use error::{KeyError, Result};
pub use kek::{InMemoryKeyProvider, KekAead, KeyProvider, KmsKeyProvider, KMS_URI_PREFIX};
pub use keyset::{KeyFamily, Keyset, KeysetEntry, SecretBytes};

//! Cryptographic materials and their versioned persistence for VeilDB.
//!
//! The per-item material lifecycle lives here:
//!
//! - [`EncryptionMaterials`] / [`DecryptionMaterials`]: the in-memory
//!   view of a material, behind the [`CryptographicMaterials`] trait
//! - [`MaterialStore`]: versioned persistence of wrapped keysets keyed
//!   by `(material_name, version)`
//! - [`MaterialsProvider`] / [`WrappedMaterialsProvider`]: fresh
//!   materials on write, signature-verified reconstitution on read
//!
//! Raw materials ([`RawEncryptionMaterials`], [`RawDecryptionMaterials`])
//! exist for callers bringing their own delegated keys; the wrapped
//! provider is the recommended path.

mod error;
mod materials;
mod provider;
pub mod schema;
mod store;

pub use error::{MaterialError, Result};
pub use materials::{
    CryptographicMaterials, DecryptionMaterials, EncryptionMaterials, MaterialDescription,
    RawDecryptionMaterials, RawEncryptionMaterials,
};
pub use provider::{MaterialsProvider, WrappedMaterialsProvider};
pub use store::MaterialStore;

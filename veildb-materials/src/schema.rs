//! Material-store table schema constants
//!
//! Defines the attribute names used in the material table and the
//! reserved keys of the material description.
//!
//! ## Table Schema
//!
//! ```text
//! Table: veildb-materials (configurable)
//!
//! Primary Key:
//!   - MaterialName (String, Partition Key): hex SHA-256 item identifier
//!   - Version (Number, Sort Key): monotonic, contiguous from 1
//!
//! Attributes:
//!   - MaterialDescription: String - flat string→string map as compact JSON
//! ```

/// Partition key attribute - material name (hex SHA-256)
pub const ATTR_MATERIAL_NAME: &str = "MaterialName";

/// Sort key attribute - material version, starting at 1
pub const ATTR_VERSION: &str = "Version";

/// Material description attribute (compact JSON string)
pub const ATTR_MATERIAL_DESCRIPTION: &str = "MaterialDescription";

/// Default table name
pub const DEFAULT_TABLE_NAME: &str = "veildb-materials";

// ---------------------------------------------------------------------------
// Reserved material-description keys
// ---------------------------------------------------------------------------

/// Primitive family of the wrapped keyset
pub const DESC_CONTENT_ENCRYPTION_ALGORITHM: &str = "ContentEncryptionAlgorithm";

/// Base64 of the KEK-encrypted keyset bytes
pub const DESC_WRAPPED_KEYSET: &str = "WrappedKeyset";

/// Base64 of the signature over the raw wrapped-keyset bytes
pub const DESC_SIGNATURE: &str = "Signature";

/// Base64 of the self-contained verification key
pub const DESC_PUBLIC_KEY: &str = "PublicKey";

/// Reserved material name under which the provider keeps the shared
/// deterministic keyset. Not derived from any item, so it can never
/// collide with the hex-encoded per-item names.
pub const DETERMINISTIC_MATERIAL_NAME: &str = "veildb.deterministic";

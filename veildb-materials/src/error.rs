//! Error types for materials and the material store

use thiserror::Error;
use veildb_keys::KeyError;

/// Result type alias using our MaterialError
pub type Result<T> = std::result::Result<T, MaterialError>;

/// Materials-layer error type
///
/// Material-related failures carry the material name so audits can trace
/// them without logging plaintext.
#[derive(Error, Debug)]
pub enum MaterialError {
    /// No material record exists for the name (and version)
    #[error("Material not found: {name}")]
    MaterialNotFound {
        /// Material name that missed
        name: String,
    },

    /// The version check-and-set was rejected; a concurrent writer won
    #[error("Concurrent version conflict for material {name}")]
    VersionConflict {
        /// Material name being appended
        name: String,
    },

    /// A reserved description entry is absent
    #[error("Material {name} description is missing entry {entry:?}")]
    MissingDescriptionEntry {
        /// Material name
        name: String,
        /// Reserved key that was expected
        entry: &'static str,
    },

    /// Material description JSON could not be produced or parsed
    #[error("Material description error: {0}")]
    Description(String),

    /// Base64 decoding of a description entry failed
    #[error("Material encoding error: {0}")]
    Encoding(String),

    /// Error from the key layer
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Error from the underlying store
    #[error(transparent)]
    Store(#[from] veildb_core::Error),
}

impl MaterialError {
    /// Create a material-not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        MaterialError::MaterialNotFound { name: name.into() }
    }

    /// Create a version-conflict error
    pub fn version_conflict(name: impl Into<String>) -> Self {
        MaterialError::VersionConflict { name: name.into() }
    }

    /// Create a missing-entry error
    pub fn missing_entry(name: impl Into<String>, entry: &'static str) -> Self {
        MaterialError::MissingDescriptionEntry {
            name: name.into(),
            entry,
        }
    }

    /// Create a description error
    pub fn description(msg: impl Into<String>) -> Self {
        MaterialError::Description(msg.into())
    }

    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        MaterialError::Encoding(msg.into())
    }
}

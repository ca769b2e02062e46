//! Error types for the encrypted client

use thiserror::Error;
use veildb_keys::KeyError;
use veildb_materials::MaterialError;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client-facing error type
///
/// Per-attribute failures carry the attribute name; material failures
/// carry the material name (inside [`MaterialError`]). Neither includes
/// plaintext.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Error from the core layer (codec, schema, store, cancellation)
    #[error(transparent)]
    Core(#[from] veildb_core::Error),

    /// Error from the key layer
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Error from the materials layer
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// Encrypting one attribute failed
    #[error("Encrypting attribute {attribute:?} failed: {source}")]
    AttributeEncrypt {
        /// Attribute being encrypted
        attribute: String,
        /// Underlying failure
        source: KeyError,
    },

    /// Decrypting one attribute failed
    #[error("Decrypting attribute {attribute:?} failed: {source}")]
    AttributeDecrypt {
        /// Attribute being decrypted
        attribute: String,
        /// Underlying failure
        source: KeyError,
    },

    /// Encoding or decoding one attribute's value failed
    #[error("Codec failure on attribute {attribute:?}: {source}")]
    AttributeCodec {
        /// Attribute being converted
        attribute: String,
        /// Underlying failure
        source: veildb_core::Error,
    },
}

impl ClientError {
    /// Attach an attribute name to an encryption failure
    pub(crate) fn attribute_encrypt(attribute: impl Into<String>, source: KeyError) -> Self {
        ClientError::AttributeEncrypt {
            attribute: attribute.into(),
            source,
        }
    }

    /// Attach an attribute name to a decryption failure
    pub(crate) fn attribute_decrypt(attribute: impl Into<String>, source: KeyError) -> Self {
        ClientError::AttributeDecrypt {
            attribute: attribute.into(),
            source,
        }
    }

    /// Attach an attribute name to a codec failure
    pub(crate) fn attribute_codec(
        attribute: impl Into<String>,
        source: veildb_core::Error,
    ) -> Self {
        ClientError::AttributeCodec {
            attribute: attribute.into(),
            source,
        }
    }
}

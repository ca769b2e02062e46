//! Cryptographic materials: the per-item view of keys and description.
//!
//! Encryption-side materials never expose a decryption key and vice
//! versa; the wrong-side accessors return capability errors rather than
//! panicking. The raw variants let a caller supply its own delegated
//! keys directly, gated on `allowed_for_raw_materials`.

use crate::error::{MaterialError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use veildb_keys::{DelegatedKey, KeyError};

/// Flat string→string mapping persisted alongside a wrapped keyset.
pub type MaterialDescription = HashMap<String, String>;

/// Common interface over encryption- and decryption-side materials.
pub trait CryptographicMaterials {
    /// The material description, reserved keys included.
    fn material_description(&self) -> &MaterialDescription;

    /// Key for encrypting attributes. Fails on decryption-side materials.
    fn encryption_key(&self) -> Result<&DelegatedKey>;

    /// Key for decrypting attributes. Fails on encryption-side materials.
    fn decryption_key(&self) -> Result<&DelegatedKey>;

    /// Signing key, when the materials carry one.
    fn signing_key(&self) -> Option<&DelegatedKey>;
}

/// Materials produced for a write.
#[derive(Debug)]
pub struct EncryptionMaterials {
    description: MaterialDescription,
    encryption_key: Arc<DelegatedKey>,
    signing_key: Option<Arc<DelegatedKey>>,
}

impl EncryptionMaterials {
    /// Assemble encryption materials.
    pub fn new(
        description: MaterialDescription,
        encryption_key: Arc<DelegatedKey>,
        signing_key: Option<Arc<DelegatedKey>>,
    ) -> Self {
        Self {
            description,
            encryption_key,
            signing_key,
        }
    }
}

impl CryptographicMaterials for EncryptionMaterials {
    fn material_description(&self) -> &MaterialDescription {
        &self.description
    }

    fn encryption_key(&self) -> Result<&DelegatedKey> {
        Ok(&self.encryption_key)
    }

    fn decryption_key(&self) -> Result<&DelegatedKey> {
        Err(MaterialError::Key(KeyError::unsupported_operation(
            "encryption materials do not provide a decryption key",
        )))
    }

    fn signing_key(&self) -> Option<&DelegatedKey> {
        self.signing_key.as_deref()
    }
}

/// Materials reconstituted for a read.
#[derive(Debug)]
pub struct DecryptionMaterials {
    description: MaterialDescription,
    decryption_key: Arc<DelegatedKey>,
}

impl DecryptionMaterials {
    /// Assemble decryption materials.
    pub fn new(description: MaterialDescription, decryption_key: Arc<DelegatedKey>) -> Self {
        Self {
            description,
            decryption_key,
        }
    }
}

impl CryptographicMaterials for DecryptionMaterials {
    fn material_description(&self) -> &MaterialDescription {
        &self.description
    }

    fn encryption_key(&self) -> Result<&DelegatedKey> {
        Err(MaterialError::Key(KeyError::unsupported_operation(
            "decryption materials do not provide an encryption key",
        )))
    }

    fn decryption_key(&self) -> Result<&DelegatedKey> {
        Ok(&self.decryption_key)
    }

    fn signing_key(&self) -> Option<&DelegatedKey> {
        None
    }
}

// Using raw cryptographic materials encrypts many items under the same
// key material, which weakens the protection wrapped materials provide.
// Prefer the wrapped provider unless there is a specific reason not to.

/// Encryption materials built directly from caller-supplied keys.
#[derive(Debug)]
pub struct RawEncryptionMaterials {
    description: MaterialDescription,
    encryption_key: Arc<DelegatedKey>,
    signing_key: Option<Arc<DelegatedKey>>,
}

impl RawEncryptionMaterials {
    /// Build raw encryption materials.
    ///
    /// # Errors
    ///
    /// Refuses keys whose `allowed_for_raw_materials()` is false
    /// (signing keysets).
    pub fn new(
        description: MaterialDescription,
        encryption_key: Arc<DelegatedKey>,
        signing_key: Option<Arc<DelegatedKey>>,
    ) -> Result<Self> {
        if !encryption_key.allowed_for_raw_materials() {
            return Err(MaterialError::Key(KeyError::unsupported_operation(
                format!(
                    "{} keys are not allowed with raw encryption materials",
                    encryption_key.algorithm()
                ),
            )));
        }
        Ok(Self {
            description,
            encryption_key,
            signing_key,
        })
    }
}

impl CryptographicMaterials for RawEncryptionMaterials {
    fn material_description(&self) -> &MaterialDescription {
        &self.description
    }

    fn encryption_key(&self) -> Result<&DelegatedKey> {
        Ok(&self.encryption_key)
    }

    fn decryption_key(&self) -> Result<&DelegatedKey> {
        Err(MaterialError::Key(KeyError::unsupported_operation(
            "raw encryption materials do not provide a decryption key",
        )))
    }

    fn signing_key(&self) -> Option<&DelegatedKey> {
        self.signing_key.as_deref()
    }
}

/// Decryption materials built directly from caller-supplied keys.
#[derive(Debug)]
pub struct RawDecryptionMaterials {
    description: MaterialDescription,
    decryption_key: Arc<DelegatedKey>,
}

impl RawDecryptionMaterials {
    /// Build raw decryption materials.
    ///
    /// # Errors
    ///
    /// Refuses keys whose `allowed_for_raw_materials()` is false.
    pub fn new(description: MaterialDescription, decryption_key: Arc<DelegatedKey>) -> Result<Self> {
        if !decryption_key.allowed_for_raw_materials() {
            return Err(MaterialError::Key(KeyError::unsupported_operation(
                format!(
                    "{} keys are not allowed with raw decryption materials",
                    decryption_key.algorithm()
                ),
            )));
        }
        Ok(Self {
            description,
            decryption_key,
        })
    }
}

impl CryptographicMaterials for RawDecryptionMaterials {
    fn material_description(&self) -> &MaterialDescription {
        &self.description
    }

    fn encryption_key(&self) -> Result<&DelegatedKey> {
        Err(MaterialError::Key(KeyError::unsupported_operation(
            "raw decryption materials do not provide an encryption key",
        )))
    }

    fn decryption_key(&self) -> Result<&DelegatedKey> {
        Ok(&self.decryption_key)
    }

    fn signing_key(&self) -> Option<&DelegatedKey> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veildb_keys::InMemoryKeyProvider;

    const KEK_URI: &str = "aws-kms://test-kek";

    #[test]
    fn test_encryption_materials_refuse_decryption_key() {
        let provider = InMemoryKeyProvider::new();
        let key = Arc::new(DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap());
        let materials = EncryptionMaterials::new(MaterialDescription::new(), key, None);

        assert!(materials.encryption_key().is_ok());
        assert!(matches!(
            materials.decryption_key(),
            Err(MaterialError::Key(KeyError::UnsupportedOperation(_)))
        ));
    }

    #[test]
    fn test_decryption_materials_refuse_encryption_key() {
        let provider = InMemoryKeyProvider::new();
        let key = Arc::new(DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap());
        let materials = DecryptionMaterials::new(MaterialDescription::new(), key);

        assert!(materials.decryption_key().is_ok());
        assert!(materials.encryption_key().is_err());
    }

    #[test]
    fn test_raw_materials_refuse_signing_keys() {
        let provider = InMemoryKeyProvider::new();
        let signing = Arc::new(DelegatedKey::generate_signing_key(KEK_URI, &provider).unwrap());

        assert!(RawEncryptionMaterials::new(
            MaterialDescription::new(),
            Arc::clone(&signing),
            None
        )
        .is_err());
        assert!(RawDecryptionMaterials::new(MaterialDescription::new(), signing).is_err());
    }

    #[test]
    fn test_raw_materials_accept_data_keys() {
        let provider = InMemoryKeyProvider::new();
        let key = Arc::new(DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap());
        assert!(RawEncryptionMaterials::new(MaterialDescription::new(), key, None).is_ok());
    }
}

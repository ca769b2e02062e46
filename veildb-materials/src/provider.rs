//! Cryptographic materials providers.
//!
//! [`WrappedMaterialsProvider`] implements the full envelope lifecycle:
//! on write it generates a fresh data keyset, wraps it under the KEK,
//! signs the wrapped bytes with a fresh signing keyset, and appends the
//! description to the material store; on read it retrieves the record,
//! verifies the signature over the byte-identical wrapped blob, and
//! unwraps the data keyset.
//!
//! ## Shared deterministic keyset
//!
//! Deterministic equality must hold across items and process restarts,
//! so the deterministic entry bundled into every data keyset comes from
//! one shared keyset persisted under a reserved material name. It is
//! created on first use; a process that loses the creation race adopts
//! the winner's keyset.

use crate::error::{MaterialError, Result};
use crate::materials::{DecryptionMaterials, EncryptionMaterials, MaterialDescription};
use crate::schema::{
    DESC_CONTENT_ENCRYPTION_ALGORITHM, DESC_PUBLIC_KEY, DESC_SIGNATURE, DESC_WRAPPED_KEYSET,
    DETERMINISTIC_MATERIAL_NAME,
};
use crate::store::MaterialStore;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use veildb_keys::{verify_signature, DelegatedKey, KeyProvider};

/// Produces fresh encryption materials on write and reconstitutes
/// decryption materials on read.
#[async_trait]
pub trait MaterialsProvider: Send + Sync + Debug {
    /// Generate, persist, and return materials for a new write under
    /// `material_name`.
    async fn encryption_materials(&self, material_name: &str) -> Result<EncryptionMaterials>;

    /// Reconstitute materials for a read. A `version` below 1 resolves
    /// to the latest stored version.
    async fn decryption_materials(
        &self,
        material_name: &str,
        version: i64,
    ) -> Result<DecryptionMaterials>;

    /// Destroy every stored version under `material_name`, returning the
    /// number removed. Called by the client facade after an item delete.
    async fn remove_materials(&self, material_name: &str) -> Result<usize>;
}

/// KEK-backed provider persisting wrapped keysets in a [`MaterialStore`].
#[derive(Debug)]
pub struct WrappedMaterialsProvider {
    kek_uri: String,
    keys: Arc<dyn KeyProvider>,
    user_context: MaterialDescription,
    store: MaterialStore,
    deterministic: OnceCell<Arc<DelegatedKey>>,
}

impl WrappedMaterialsProvider {
    /// Create a provider.
    ///
    /// `user_context` entries are copied verbatim into every material
    /// description.
    pub fn new(
        kek_uri: impl Into<String>,
        keys: Arc<dyn KeyProvider>,
        user_context: MaterialDescription,
        store: MaterialStore,
    ) -> Self {
        Self {
            kek_uri: kek_uri.into(),
            keys,
            user_context,
            store,
            deterministic: OnceCell::new(),
        }
    }

    /// The material store backing this provider.
    pub fn material_store(&self) -> &MaterialStore {
        &self.store
    }

    fn build_description(
        &self,
        algorithm: &str,
        wrapped: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> MaterialDescription {
        let mut description = self.user_context.clone();
        description.insert(
            DESC_CONTENT_ENCRYPTION_ALGORITHM.to_string(),
            algorithm.to_string(),
        );
        description.insert(DESC_WRAPPED_KEYSET.to_string(), BASE64.encode(wrapped));
        description.insert(DESC_SIGNATURE.to_string(), BASE64.encode(signature));
        description.insert(DESC_PUBLIC_KEY.to_string(), BASE64.encode(public_key));
        description
    }

    /// Retrieve, signature-check, and unwrap one stored material.
    async fn verify_and_unwrap(
        &self,
        name: &str,
        version: i64,
    ) -> Result<(MaterialDescription, Arc<DelegatedKey>)> {
        let (description, wrapped_b64) = self.store.retrieve(name, version).await?;

        let wrapped = BASE64
            .decode(wrapped_b64.as_bytes())
            .map_err(|e| MaterialError::encoding(format!("material {name}: wrapped keyset: {e}")))?;
        let public_key = decode_entry(&description, name, DESC_PUBLIC_KEY)?;
        let signature = decode_entry(&description, name, DESC_SIGNATURE)?;

        verify_signature(&public_key, &signature, &wrapped)?;

        let key = DelegatedKey::unwrap_keyset(&wrapped, &self.kek_uri, self.keys.as_ref()).await?;
        Ok((description, Arc::new(key)))
    }

    /// Wrap, sign, and append one keyset under `name`.
    async fn store_keyset(&self, name: &str, key: &DelegatedKey) -> Result<i64> {
        let wrapped = key.wrap_keyset().await?;

        let signing_key = DelegatedKey::generate_signing_key(&self.kek_uri, self.keys.as_ref())?;
        let public_key = signing_key.public_key_bytes()?;
        let signature = signing_key.sign(&wrapped)?;

        let description =
            self.build_description(key.algorithm(), &wrapped, &signature, &public_key);
        self.store.store_new(name, &description).await
    }

    /// The shared deterministic keyset, fetched or created on first use
    /// and memoized for the provider's lifetime.
    async fn deterministic_key(&self) -> Result<Arc<DelegatedKey>> {
        self.deterministic
            .get_or_try_init(|| async {
                match self
                    .verify_and_unwrap(DETERMINISTIC_MATERIAL_NAME, 0)
                    .await
                {
                    Ok((_, key)) => Ok(key),
                    Err(MaterialError::MaterialNotFound { .. }) => {
                        self.create_deterministic_key().await
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .cloned()
    }

    async fn create_deterministic_key(&self) -> Result<Arc<DelegatedKey>> {
        let key =
            DelegatedKey::generate_deterministic_key(&self.kek_uri, self.keys.as_ref())?;
        match self.store_keyset(DETERMINISTIC_MATERIAL_NAME, &key).await {
            Ok(version) => {
                debug!(version, "created shared deterministic keyset");
                Ok(Arc::new(key))
            }
            // A concurrent creator won; adopt its keyset.
            Err(MaterialError::VersionConflict { .. }) => Ok(self
                .verify_and_unwrap(DETERMINISTIC_MATERIAL_NAME, 0)
                .await?
                .1),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MaterialsProvider for WrappedMaterialsProvider {
    async fn encryption_materials(&self, material_name: &str) -> Result<EncryptionMaterials> {
        let shared = self.deterministic_key().await?;
        let data_key = DelegatedKey::generate_data_key_with_deterministic(
            &self.kek_uri,
            self.keys.as_ref(),
            &shared,
        )?;

        let wrapped = data_key.wrap_keyset().await?;

        let signing_key = DelegatedKey::generate_signing_key(&self.kek_uri, self.keys.as_ref())?;
        let public_key = signing_key.public_key_bytes()?;
        let signature = signing_key.sign(&wrapped)?;

        let description =
            self.build_description(data_key.algorithm(), &wrapped, &signature, &public_key);
        let version = self.store.store_new(material_name, &description).await?;
        debug!(material_name, version, "generated encryption materials");

        Ok(EncryptionMaterials::new(
            description,
            Arc::new(data_key),
            Some(Arc::new(signing_key)),
        ))
    }

    async fn decryption_materials(
        &self,
        material_name: &str,
        version: i64,
    ) -> Result<DecryptionMaterials> {
        let (description, key) = self.verify_and_unwrap(material_name, version).await?;
        Ok(DecryptionMaterials::new(description, key))
    }

    async fn remove_materials(&self, material_name: &str) -> Result<usize> {
        self.store.delete_all_versions(material_name).await
    }
}

fn decode_entry(
    description: &MaterialDescription,
    name: &str,
    entry: &'static str,
) -> Result<Vec<u8>> {
    let encoded = description
        .get(entry)
        .ok_or_else(|| MaterialError::missing_entry(name, entry))?;
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| MaterialError::encoding(format!("material {name}: {entry}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::CryptographicMaterials;
    use crate::schema::DEFAULT_TABLE_NAME;
    use veildb_core::MemoryStore;
    use veildb_keys::{InMemoryKeyProvider, KeyError};

    const KEK_URI: &str = "aws-kms://test-kek";

    async fn provider_over(
        backing: Arc<MemoryStore>,
        keys: Arc<InMemoryKeyProvider>,
    ) -> WrappedMaterialsProvider {
        let store = MaterialStore::new(backing, DEFAULT_TABLE_NAME);
        store.ensure_table().await.unwrap();
        WrappedMaterialsProvider::new(KEK_URI, keys, MaterialDescription::new(), store)
    }

    async fn provider() -> WrappedMaterialsProvider {
        provider_over(
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryKeyProvider::new()),
        )
        .await
    }

    #[tokio::test]
    async fn test_write_then_read_materials() {
        let provider = provider().await;

        let enc = provider.encryption_materials("item-a").await.unwrap();
        let ciphertext = enc
            .encryption_key()
            .unwrap()
            .encrypt(b"payload", b"Email")
            .unwrap();

        let dec = provider.decryption_materials("item-a", 0).await.unwrap();
        let plaintext = dec
            .decryption_key()
            .unwrap()
            .decrypt(&ciphertext, b"Email")
            .unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[tokio::test]
    async fn test_description_carries_reserved_keys_and_context() {
        let backing = Arc::new(MemoryStore::new());
        let keys = Arc::new(InMemoryKeyProvider::new());
        let store = MaterialStore::new(Arc::clone(&backing) as _, DEFAULT_TABLE_NAME);
        store.ensure_table().await.unwrap();

        let mut context = MaterialDescription::new();
        context.insert("tenant".to_string(), "acme".to_string());
        let provider = WrappedMaterialsProvider::new(KEK_URI, keys, context, store);

        let enc = provider.encryption_materials("item-a").await.unwrap();
        let description = enc.material_description();
        assert_eq!(description.get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(
            description
                .get(DESC_CONTENT_ENCRYPTION_ALGORITHM)
                .map(String::as_str),
            Some("AesGcmKey")
        );
        assert!(description.contains_key(DESC_WRAPPED_KEYSET));
        assert!(description.contains_key(DESC_SIGNATURE));
        assert!(description.contains_key(DESC_PUBLIC_KEY));
    }

    #[tokio::test]
    async fn test_versions_append_per_write() {
        let provider = provider().await;
        provider.encryption_materials("item-a").await.unwrap();
        provider.encryption_materials("item-a").await.unwrap();

        assert_eq!(
            provider.material_store().all_versions("item-a").await.unwrap(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_tampered_wrapped_keyset_fails_signature_check() {
        let provider = provider().await;
        provider.encryption_materials("item-a").await.unwrap();

        // Re-store the record with one byte of the wrapped keyset flipped.
        let (mut description, wrapped_b64) = provider
            .material_store()
            .retrieve("item-a", 1)
            .await
            .unwrap();
        let mut wrapped = BASE64.decode(wrapped_b64).unwrap();
        wrapped[0] ^= 0x01;
        description.insert(DESC_WRAPPED_KEYSET.to_string(), BASE64.encode(&wrapped));
        provider
            .material_store()
            .store_new("item-a", &description)
            .await
            .unwrap();

        let err = provider.decryption_materials("item-a", 0).await.unwrap_err();
        assert!(matches!(
            err,
            MaterialError::Key(KeyError::SignatureInvalid(_))
        ));
    }

    #[tokio::test]
    async fn test_deterministic_keyset_shared_across_providers() {
        let backing = Arc::new(MemoryStore::new());
        let keys = Arc::new(InMemoryKeyProvider::new());

        let first = provider_over(Arc::clone(&backing), Arc::clone(&keys)).await;
        let second = provider_over(backing, keys).await;

        let a = first.encryption_materials("item-a").await.unwrap();
        let b = second.encryption_materials("item-b").await.unwrap();

        let ct_a = a
            .encryption_key()
            .unwrap()
            .encrypt_deterministic(b"a@x", b"Email")
            .unwrap();
        let ct_b = b
            .encryption_key()
            .unwrap()
            .encrypt_deterministic(b"a@x", b"Email")
            .unwrap();
        assert_eq!(ct_a, ct_b);
    }

    #[tokio::test]
    async fn test_remove_materials() {
        let provider = provider().await;
        provider.encryption_materials("item-a").await.unwrap();
        provider.encryption_materials("item-a").await.unwrap();

        assert_eq!(provider.remove_materials("item-a").await.unwrap(), 2);
        let err = provider.decryption_materials("item-a", 0).await.unwrap_err();
        assert!(matches!(err, MaterialError::MaterialNotFound { .. }));
    }
}
